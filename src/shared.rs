//! A [`NavigationEngine`] shared with interrupt or callback context.
//!
//! Transport stacks often deliver writes and connection events from their own
//! callbacks. Parking the engine in a `critical_section::Mutex` lets those
//! callbacks and the control loop take turns on it, each access running to
//! completion before the other.
//!
//! [`Helm`](crate::helm::Helm) owns its engine and expects transport events to
//! be funneled into the loop. Firmware whose stack calls back from interrupt
//! context uses this cell in its place: callbacks touch the engine through
//! [`with_engine`], and the loop runs only the update inside the critical
//! section. Correction and publishing, which block on the radio and the link,
//! run outside it with the loop's own
//! [`HeadingCorrectionController`](crate::correction::HeadingCorrectionController)
//! and [`TelemetryChannel`](crate::telemetry::TelemetryChannel).
//!
//! ```
//! use helm::config::NavigationConfig;
//! use helm::correction::HeadingCorrectionController;
//! use helm::model::{HeadingSample, Position};
//! use helm::shared::{SharedEngine, shared_engine_init, shared_engine_setup, with_engine};
//!
//! static ENGINE: SharedEngine = shared_engine_init();
//!
//! shared_engine_setup(&ENGINE, NavigationConfig::default());
//!
//! // from a transport callback
//! let accepted = with_engine(&ENGINE, |engine| {
//!     engine.set_target(-32.940931, 151.718029, 45.2, 0).is_ok()
//! });
//! assert_eq!(accepted, Some(true));
//!
//! // from the control loop
//! let mut controller = HeadingCorrectionController::default();
//! let position = Position::fix(-32.95, 151.70);
//! if let Some(snapshot) = with_engine(&ENGINE, |engine| engine.update(&position, HeadingSample(0.0))) {
//!     // no app connected yet, so nothing to steer
//!     assert_eq!(controller.evaluate(&snapshot, 0), None);
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::NavigationConfig;
use crate::navigation::NavigationEngine;

/// The static cell type holding a shared engine.
pub type SharedEngine = Mutex<RefCell<Option<NavigationEngine>>>;

/// An empty cell, for initializing a `static`.
pub const fn shared_engine_init() -> SharedEngine {
    Mutex::new(RefCell::new(None))
}

/// Installs a fresh engine in `shared`, replacing any previous one.
pub fn shared_engine_setup(shared: &'static SharedEngine, config: NavigationConfig) {
    critical_section::with(|cs| {
        let _ = shared
            .borrow(cs)
            .replace(Some(NavigationEngine::new(config)));
    });
}

/// Runs `f` on the shared engine inside a critical section.
///
/// Returns `None` when no engine has been installed yet.
pub fn with_engine<R>(
    shared: &'static SharedEngine,
    f: impl FnOnce(&mut NavigationEngine) -> R,
) -> Option<R> {
    critical_section::with(|cs| shared.borrow(cs).borrow_mut().as_mut().map(f))
}
