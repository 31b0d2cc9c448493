//! Actions module: decoding model output and executing it on the device.

mod command;
mod handler;

pub use command::{
    parse_command, split_think_answer, strip_fences, Action, Command, NormalizedPoint, ParseError,
    NORMALIZED_MAX,
};
pub use handler::{
    resolve_app, scale_coordinate, scale_point, ActionHandler, ActionResult, GestureTimings,
};
