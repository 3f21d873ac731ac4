pub mod client;
pub mod sampling;
pub mod session;
pub mod weather;

pub use client::{BackendError, ChatBackend, ChatRequest, ChatResponse, HttpChatBackend};
pub use sampling::{PerfumePick, SamplingEngine, TimeOfDay};
pub use session::{SessionBridge, SessionContext, SessionError, SubmitOutcome};
pub use weather::{Observation, WeatherError, WeatherFetcher};
