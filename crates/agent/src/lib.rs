pub mod conversation;
pub mod dispatcher;
pub mod loop_detector;

pub use conversation::{ConversationLog, TurnOutcome, TurnRunner};
pub use dispatcher::{BrowserTools, SequentialToolDispatcher, ToolCallResponse, ToolExecutor, SKIP_MESSAGE};
pub use loop_detector::{LoopDetector, DEFAULT_LOOP_WINDOW};
