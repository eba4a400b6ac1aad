//! Simulated controller and platform shared by the integration tests
#![allow(dead_code)]

use log::{Level, LevelFilter, Log, Metadata, Record};
use samv7_mcan::bus::{ConfigurationError, Mcan};
use samv7_mcan::config::CanConfig;
use samv7_mcan::core::fugit::HertzU32;
use samv7_mcan::core::{AttachError, Dependencies, InterruptLine};
use samv7_mcan::driver::Receiver;
use samv7_mcan::message::Frame;
use samv7_mcan::messageram::Region;
use samv7_mcan::reg::{Bus, Reg};
use std::cell::{Cell, RefCell};
use std::sync::Once;

const IR_RF0N: u32 = 1 << 0;
const IR_RF0L: u32 = 1 << 3;
const IR_RF1N: u32 = 1 << 4;
const IR_RF1L: u32 = 1 << 7;
const IR_TC: u32 = 1 << 9;

#[derive(Default)]
struct FifoState {
    get: usize,
    fill: usize,
}

/// Register model of one controller
pub struct SimBus {
    regs: RefCell<[u32; 64]>,
    fifos: [RefCell<FifoState>; 2],
    /// CCCR.INIT never reads back as set
    pub init_stuck: Cell<bool>,
    /// Frames the hardware stores into FIFO 0 right after the driver read
    /// RXF0S
    pub arrivals_after_status: Cell<usize>,
    /// Every register write, in order
    pub writes: RefCell<Vec<(Reg, u32)>>,
    /// Line the platform refuses to attach
    pub fail_attach: Cell<Option<InterruptLine>>,
    /// Calls into the platform, in order
    pub events: RefCell<Vec<String>>,
}

impl SimBus {
    pub fn new() -> Self {
        let bus = Self {
            regs: RefCell::new([0; 64]),
            fifos: Default::default(),
            init_stuck: Cell::new(false),
            arrivals_after_status: Cell::new(0),
            writes: RefCell::new(Vec::new()),
            fail_attach: Cell::new(None),
            events: RefCell::new(Vec::new()),
        };
        // Reset value: initialization mode
        bus.set(Reg::Cccr, 1);
        bus
    }

    pub fn get(&self, reg: Reg) -> u32 {
        self.regs.borrow()[reg.offset() / 4]
    }

    fn set(&self, reg: Reg, value: u32) {
        self.regs.borrow_mut()[reg.offset() / 4] = value;
    }

    pub fn raise(&self, bits: u32) {
        self.set(Reg::Ir, self.get(Reg::Ir) | bits);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn writes_to(&self, reg: Reg) -> Vec<u32> {
        self.writes
            .borrow()
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    fn fifo_depth(&self, fifo: usize) -> usize {
        let config = if fifo == 0 { Reg::Rxf0c } else { Reg::Rxf1c };
        ((self.get(config) >> 16) & 0x7f) as usize
    }

    pub fn fifo_fill(&self, fifo: usize) -> usize {
        self.fifos[fifo].borrow().fill
    }

    fn fifo_status(&self, fifo: usize) -> u32 {
        let depth = self.fifo_depth(fifo);
        let state = self.fifos[fifo].borrow();
        let put = if depth == 0 {
            0
        } else {
            (state.get + state.fill) % depth
        };
        let lost_bit = if fifo == 0 { IR_RF0L } else { IR_RF1L };
        let lost = self.get(Reg::Ir) & lost_bit != 0;
        state.fill as u32
            | (state.get as u32) << 8
            | (put as u32) << 16
            | ((depth > 0 && state.fill == depth) as u32) << 24
            | (lost as u32) << 25
    }

    fn acknowledge(&self, fifo: usize, index: u32) {
        let depth = self.fifo_depth(fifo);
        let mut state = self.fifos[fifo].borrow_mut();
        let acked = (index as usize + depth - state.get) % depth + 1;
        state.fill -= acked.min(state.fill);
        state.get = (index as usize + 1) % depth;
    }

    fn tx_queue_status(&self) -> u32 {
        let txbc = self.get(Reg::Txbc);
        let dedicated = ((txbc >> 16) & 0x3f) as usize;
        let queue = ((txbc >> 24) & 0x3f) as usize;
        let pending = self.get(Reg::Txbrp);
        let free: Vec<usize> = (dedicated..dedicated + queue)
            .filter(|i| pending & (1 << i) == 0)
            .collect();
        let put = free.first().copied().unwrap_or(0) as u32;
        free.len() as u32 | put << 16 | (free.is_empty() as u32) << 21
    }

    /// Marks the pending request of `slot` as transmitted
    pub fn complete(&self, slot: usize) {
        let bit = 1 << slot;
        self.set(Reg::Txbrp, self.get(Reg::Txbrp) & !bit);
        self.set(Reg::Txbto, self.get(Reg::Txbto) | bit);
        self.raise(IR_TC);
    }

    pub fn loopback(&self) -> bool {
        self.get(Reg::Cccr) & (1 << 7) != 0 && self.get(Reg::Test) & (1 << 4) != 0
    }

    /// `true` if any line is asserted
    pub fn interrupt_asserted(&self) -> bool {
        self.get(Reg::Ir) & self.get(Reg::Ie) != 0
    }
}

impl Bus for SimBus {
    fn read(&self, reg: Reg) -> u32 {
        match reg {
            Reg::Cccr if self.init_stuck.get() => self.get(reg) & !1,
            Reg::Rxf0s | Reg::Rxf1s => {
                let fifo = (reg == Reg::Rxf1s) as usize;
                let status = self.fifo_status(fifo);
                if fifo == 0 {
                    let arrivals = self.arrivals_after_status.replace(0);
                    self.fifos[0].borrow_mut().fill += arrivals;
                }
                status
            }
            Reg::Txfqs => self.tx_queue_status(),
            _ => self.get(reg),
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        self.writes.borrow_mut().push((reg, value));
        match reg {
            Reg::Ir => self.set(reg, self.get(reg) & !value),
            Reg::Txbar => {
                self.set(Reg::Txbrp, self.get(Reg::Txbrp) | value);
                self.set(Reg::Txbto, self.get(Reg::Txbto) & !value);
            }
            Reg::Rxf0a => self.acknowledge(0, value & 0x3f),
            Reg::Rxf1a => self.acknowledge(1, value & 0x3f),
            _ => self.set(reg, value),
        }
    }
}

/// Platform side of the tests. Events are recorded on the bus.
pub struct SimDeps<'a> {
    bus: &'a SimBus,
    eligible: *const (),
}

impl<'a> SimDeps<'a> {
    pub fn new(bus: &'a SimBus, eligible: *const ()) -> Self {
        Self { bus, eligible }
    }

    fn event(&self, event: String) {
        self.bus.events.borrow_mut().push(event);
    }
}

unsafe impl Dependencies for SimDeps<'_> {
    fn host_clock(&self) -> HertzU32 {
        HertzU32::MHz(150)
    }

    fn can_clock(&self) -> HertzU32 {
        HertzU32::MHz(48)
    }

    fn eligible_message_ram_start(&self) -> *const () {
        self.eligible
    }

    fn attach_interrupt(&self, line: InterruptLine) -> Result<(), AttachError> {
        self.event(format!("attach {:?}", line));
        if self.bus.fail_attach.get() == Some(line) {
            Err(AttachError { line })
        } else {
            Ok(())
        }
    }

    fn detach_interrupt(&self, line: InterruptLine) {
        self.event(format!("detach {:?}", line));
    }

    fn enable_interrupt(&self, line: InterruptLine) {
        self.event(format!("enable {:?}", line));
    }

    fn disable_interrupt(&self, line: InterruptLine) {
        self.event(format!("disable {:?}", line));
    }
}

/// Upper layer stand-in collecting delivered frames
#[derive(Default)]
pub struct Recorder {
    pub frames: RefCell<Vec<Frame>>,
    pub reject: Cell<bool>,
}

impl Recorder {
    pub fn receive(&self, frame: &Frame) -> Result<(), &'static str> {
        if self.reject.get() {
            return Err("no buffer");
        }
        self.frames.borrow_mut().push(*frame);
        Ok(())
    }
}

pub type Driver<'a> = Mcan<'a, &'a SimBus, SimDeps<'a>, RecorderRef<'a>>;

/// [`Receiver`] forwarding to a borrowed [`Recorder`]
pub struct RecorderRef<'a>(pub &'a Recorder);

impl Receiver for RecorderRef<'_> {
    type Error = &'static str;

    fn receive(&self, frame: &Frame) -> Result<(), Self::Error> {
        self.0.receive(frame)
    }
}

pub fn build<'a>(
    bus: &'a SimBus,
    recorder: &'a Recorder,
    config: CanConfig,
    ram: &'a mut [vcell::VolatileCell<u32>],
) -> Result<Driver<'a>, ConfigurationError> {
    let deps = SimDeps::new(bus, ram.as_ptr().cast());
    Mcan::new(bus, deps, RecorderRef(recorder), config, ram)
}

fn region_words(can: &Driver<'_>, region: Region, index: usize) -> Vec<u32> {
    // Safety: Only the simulated controller side touches these words
    let ram = unsafe { can.message_ram() };
    let offset = region.element(index);
    ram[offset..offset + region.element_words]
        .iter()
        .map(|w| w.get())
        .collect()
}

/// Transmits every pending request. In loopback mode the frames are run
/// through acceptance filtering as if received.
pub fn transmit(bus: &SimBus, can: &Driver<'_>) -> Vec<usize> {
    let pending = bus.get(Reg::Txbrp);
    let mut sent = Vec::new();
    for slot in 0..32 {
        if pending & (1 << slot) == 0 {
            continue;
        }
        let words = region_words(can, can.layout().dedicated_tx_buffers, slot);
        bus.complete(slot);
        if bus.loopback() {
            receive(bus, can, &words);
        }
        sent.push(slot);
    }
    sent
}

enum Target {
    Fifo(usize, Option<u8>),
    Rejected,
}

fn standard_filter(word: u32, id: u32) -> Option<u32> {
    let action = (word >> 27) & 0x7;
    let id1 = (word >> 16) & 0x7ff;
    let id2 = word & 0x7ff;
    let matched = match word >> 30 {
        0 => id1 <= id && id <= id2,
        1 => id == id1 || id == id2,
        2 => id & id2 == id1 & id2,
        _ => false,
    };
    (action != 0 && matched).then_some(action)
}

fn extended_filter(f0: u32, f1: u32, id: u32) -> Option<u32> {
    let action = f0 >> 29;
    let id1 = f0 & 0x1fff_ffff;
    let id2 = f1 & 0x1fff_ffff;
    let matched = match f1 >> 30 {
        0 | 3 => id1 <= id && id <= id2,
        1 => id == id1 || id == id2,
        2 => id & id2 == id1 & id2,
        _ => false,
    };
    (action != 0 && matched).then_some(action)
}

fn accept(bus: &SimBus, can: &Driver<'_>, w0: u32) -> Target {
    let gfc = bus.get(Reg::Gfc);
    let extended = w0 & (1 << 30) != 0;
    let remote = w0 & (1 << 29) != 0;
    let layout = can.layout();

    let reject_remote = if extended { 1 } else { 2 };
    if remote && gfc & reject_remote != 0 {
        return Target::Rejected;
    }

    let matched = if extended {
        let id = w0 & 0x1fff_ffff;
        (0..layout.extended_filters.elements).find_map(|i| {
            let words = region_words(can, layout.extended_filters, i);
            extended_filter(words[0], words[1], id).map(|a| (i, a))
        })
    } else {
        let id = (w0 >> 18) & 0x7ff;
        (0..layout.standard_filters.elements).find_map(|i| {
            let words = region_words(can, layout.standard_filters, i);
            standard_filter(words[0], id).map(|a| (i, a))
        })
    };

    match matched {
        Some((i, 1 | 5)) => Target::Fifo(0, Some(i as u8)),
        Some((i, 2 | 6)) => Target::Fifo(1, Some(i as u8)),
        Some(_) => Target::Rejected,
        None => {
            let non_matching = if extended { (gfc >> 2) & 3 } else { (gfc >> 4) & 3 };
            match non_matching {
                0 => Target::Fifo(0, None),
                1 => Target::Fifo(1, None),
                _ => Target::Rejected,
            }
        }
    }
}

/// Presents a frame, encoded as a TX element, to the controller. Returns the
/// FIFO it was stored in.
pub fn receive(bus: &SimBus, can: &Driver<'_>, element: &[u32]) -> Option<usize> {
    let (fifo, filter) = match accept(bus, can, element[0]) {
        Target::Fifo(fifo, filter) => (fifo, filter),
        Target::Rejected => return None,
    };
    store(bus, can, fifo, element, filter);
    Some(fifo)
}

/// Writes `element` into the put slot of `fifo`, bypassing filtering
pub fn store(bus: &SimBus, can: &Driver<'_>, fifo: usize, element: &[u32], filter: Option<u8>) {
    let region = if fifo == 0 {
        can.layout().rx_fifo_0
    } else {
        can.layout().rx_fifo_1
    };
    let depth = bus.fifo_depth(fifo);
    let (new, lost) = if fifo == 0 {
        (IR_RF0N, IR_RF0L)
    } else {
        (IR_RF1N, IR_RF1L)
    };
    let put = {
        let state = bus.fifos[fifo].borrow();
        if state.fill == depth {
            drop(state);
            bus.raise(lost);
            return;
        }
        (state.get + state.fill) % depth
    };

    let w1 = match filter {
        Some(index) => element[1] | (index as u32) << 24,
        None => element[1] | 1 << 31,
    };
    // Safety: Written as the controller would
    let ram = unsafe { can.message_ram() };
    let offset = region.element(put);
    for (i, word) in ram[offset..offset + region.element_words].iter().enumerate() {
        let value = match i {
            0 => element[0],
            1 => w1,
            _ => element.get(i).copied().unwrap_or(0),
        };
        word.set(value);
    }
    bus.fifos[fifo].borrow_mut().fill += 1;
    bus.raise(new);
}

/// Classic data frame as a TX element
pub fn element(id: u32, extended: bool, data: &[u8]) -> Vec<u32> {
    let w0 = if extended {
        id | 1 << 30
    } else {
        id << 18
    };
    let mut words = vec![w0, (data.len() as u32) << 16];
    for chunk in data.chunks(4) {
        let mut bytes = [0; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        words.push(u32::from_le_bytes(bytes));
    }
    words
}

struct CaptureLogger;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| {
            r.borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT_LOGGER: Once = Once::new();

/// Installs the capturing logger and clears this thread's records
pub fn capture_logs() {
    INIT_LOGGER.call_once(|| {
        log::set_logger(&LOGGER).expect("logger installed twice");
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

/// Records logged on this thread at `level`
pub fn logged(level: Level) -> Vec<String> {
    RECORDS.with(|r| {
        r.borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    })
}
