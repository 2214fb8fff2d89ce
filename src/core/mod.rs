pub mod realtime;
pub mod session;
pub mod telephony;
pub mod translator;

pub use realtime::{
    ClientEvent, RealtimeSettings, RealtimeVoice, ServerEvent, UpstreamConnection, UpstreamError,
    UpstreamResult,
};
pub use session::{
    RelayContext, RelayError, RelayFlow, Session, SessionId, SessionRegistry, SessionSnapshot,
    SessionState,
};
pub use telephony::{TelephonyEvent, TelephonyOutbound};
pub use translator::{InboundAction, TranslateError, UpstreamAction};
