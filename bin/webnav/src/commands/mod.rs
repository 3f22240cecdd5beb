pub mod browser;
pub mod dom;
pub mod onboard;
pub mod run_cmd;
pub mod status;
pub mod tools_cmd;
