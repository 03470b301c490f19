mod input;
mod key_result;
mod search_input;

pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
