#![no_std]
#![warn(missing_docs)]
//! # SAMV7 MCAN
//!
//! ## Overview
//! This crate provides an interrupt driven CAN driver core for the MCAN
//! (revision A) controllers of SAMV7 microcontrollers.
//!
//! It provides the following features:
//!
//! - classical CAN, CAN FD and CAN FD with bit rate switching
//! - message RAM partitioning validated before the hardware is touched
//! - bit timing computation from the CAN core clock
//! - message transmission through the TX FIFO/queue with bounded admission
//! - message reception through two FIFOs, delivered to a [`Receiver`]
//! - standard and extended filters
//! - error interrupt recovery and diagnostics through [`log`]
//!
//! MCAN is embedded in the MCU like all other peripherals. The interface
//! between them includes a clock signal, two HW interrupt lines, a
//! memory-mapped register block and a RAM region (referred to as Message RAM)
//! that both CPU and MCAN can access and share information through.
//!
//! Everything platform specific (clocks, pins, the upper address bits of the
//! message RAM, interrupt routing and cache maintenance) is provided through
//! the [`Dependencies`] trait of [`samv7_mcan_core`]. All register access
//! goes through a [`Bus`]; [`Mmio`] is the memory-mapped implementation.
//!
//! ## Message RAM Configuration
//!
//! The MCAN uses 16-bit addressing internally. All higher bits of the
//! addresses are configured in the bus matrix, outside of this driver.
//! [`Dependencies::eligible_message_ram_start`] provides a way to verify that
//! the memory region provided by a user is inside the window the controller
//! can reach; yet it is up to the user to place it in valid RAM.
//!
//! One can configure the Message RAM as follows
//! - specify a custom `MEMORY` entry in a linker script mapped to the valid RAM
//!   memory region
//! - introduce a custom, `.bss` like (`NOLOAD` property), section - eg. `.can`
//! - map the input section to the `MEMORY` entry
//! - use the `#[link_section]` attribute to place a [`MessageRam`] there
//!
//! Example of a linker script
//! ```text
//! MEMORY
//! {
//!   FLASH : ORIGIN = 0x400000, LENGTH = 2M
//!   CAN : ORIGIN = 0x20400000, LENGTH = 64K
//!   RAM : ORIGIN = 0x20410000, LENGTH = 320K
//! }
//!
//! SECTIONS {
//!   .can (NOLOAD) :
//!   {
//!     *(.can .can.*);
//!   } > CAN
//! }
//! ```
//!
//! ## General usage example
//!
//! ```no_run
//! # use samv7_mcan::core::{AttachError, CanId, InterruptLine};
//! # use fugit::RateExtU32 as _;
//! # struct Can0;
//! # unsafe impl CanId for Can0 {
//! #     const ADDRESS: *const () = 0x4003_0000 as *const _;
//! # }
//! # struct Dependencies;
//! # unsafe impl samv7_mcan::core::Dependencies for Dependencies {
//! #     fn eligible_message_ram_start(&self) -> *const () { unreachable!() }
//! #     fn host_clock(&self) -> fugit::HertzU32 { unreachable!() }
//! #     fn can_clock(&self) -> fugit::HertzU32 { unreachable!() }
//! #     fn attach_interrupt(&self, _: InterruptLine) -> Result<(), AttachError> { unreachable!() }
//! #     fn detach_interrupt(&self, _: InterruptLine) {}
//! #     fn enable_interrupt(&self, _: InterruptLine) {}
//! #     fn disable_interrupt(&self, _: InterruptLine) {}
//! # }
//! use samv7_mcan::bus::Mcan;
//! use samv7_mcan::config::{CanConfig, Mode};
//! use samv7_mcan::filter::{Action, Filter};
//! use samv7_mcan::message::Frame;
//! use samv7_mcan::messageram::MessageRam;
//! use samv7_mcan::reg::Mmio;
//! use samv7_mcan::embedded_can::StandardId;
//!
//! #[link_section = ".can"]
//! static mut MESSAGE_RAM: MessageRam<512> = MessageRam::new();
//!
//! let mut config = CanConfig::new(500.kHz());
//! config.mode = Mode::FdBitRateSwitching;
//! config.data_timing.bitrate = 2.MHz();
//!
//! let receiver = |frame: &Frame| -> Result<(), ()> {
//!     // hand the frame to the upper layer
//!     Ok(())
//! };
//! let can = Mcan::new(
//!     unsafe { Mmio::<Can0>::new() },
//!     Dependencies,
//!     receiver,
//!     config,
//!     unsafe { (*core::ptr::addr_of_mut!(MESSAGE_RAM)).words() },
//! )
//! .unwrap();
//!
//! can.setup().unwrap();
//! // Accept every standard frame into FIFO 0
//! can.set_standard_filter(
//!     0,
//!     Filter::Classic {
//!         action: Action::StoreFifo0,
//!         filter: StandardId::ZERO,
//!         mask: StandardId::ZERO,
//!     },
//! )
//! .unwrap();
//! can.rxint(true);
//! can.txint(true);
//!
//! let frame = Frame::new(StandardId::new(0x123).unwrap(), &[1, 2, 3]).unwrap();
//! can.blocking_send(&frame).unwrap();
//! ```
//!
//! The interrupt handlers of both lines call [`Mcan::on_interrupt`].
//!
//! [`Receiver`]: crate::driver::Receiver
//! [`Dependencies`]: samv7_mcan_core::Dependencies
//! [`Dependencies::eligible_message_ram_start`]: samv7_mcan_core::Dependencies::eligible_message_ram_start
//! [`Bus`]: crate::reg::Bus
//! [`Mmio`]: crate::reg::Mmio
//! [`MessageRam`]: crate::messageram::MessageRam
//! [`Mcan::on_interrupt`]: crate::bus::Mcan::on_interrupt

pub mod bus;
pub mod config;
pub mod driver;
pub mod filter;
pub mod interrupt;
pub mod message;
pub mod messageram;
pub mod prelude;
pub mod reg;
pub mod registry;
pub mod rx_fifo;
pub mod tx;

pub use embedded_can;
pub use samv7_mcan_core as core;
