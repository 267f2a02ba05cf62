mod store;
mod table;
mod types;

pub use store::{RunStore, RunWindow};
pub use table::{
    Exclusions, RunTable, BUILD_ID, FAILED, MESSAGE, MESSAGE_SEPARATOR, RESULT, SEQUENCE, TIME,
    TYPED_COLUMNS,
};
pub use types::{Outcome, Run};
