//! `locobot-runtime` – the pick-and-place behaviour.
//!
//! # Modules
//!
//! - [`pick_place`] – [`PickPlace`][pick_place::PickPlace]: calibrates the
//!   arm against its AR tag, then repeatedly finds table-top clusters, drops
//!   the ones already handled, picks the rest into a virtual basket and
//!   drives the base somewhere new.  Stops on a shutdown flag, printing
//!   [`INTERRUPT_MESSAGE`][pick_place::INTERRUPT_MESSAGE].
//! - [`locomotion`] – [`Locomotion`][locomotion::Locomotion]: random drive
//!   commands between pick cycles.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod locomotion;
pub mod pick_place;
pub mod telemetry;

pub use locomotion::{Locomotion, drive_command};
pub use pick_place::{
    Flow, INTERRUPT_MESSAGE, LoopState, PickPlace, PickPlaceConfig, RunSummary, sleep_sliced,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
