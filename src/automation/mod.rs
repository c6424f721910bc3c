// Automation core: input driver, session helpers, routines and the perception-action loop

pub mod config;
pub mod driver;
pub mod error;
pub mod fsm;
pub mod routine;
pub mod session;
pub mod types;


pub use config::{ActionPolicy, AutomationConfig, ReconnectPolicy};
pub use driver::ActionDriver;
pub use error::{AutomationError, AutomationResult};
pub use fsm::AutomationLoop;
pub use routine::{CycleFuture, Routine, RoutineRegistry, TemplateTapRoutine, scan_template_files};
pub use session::AutomationSession;
pub use types::{LoopState, StopHandle};
