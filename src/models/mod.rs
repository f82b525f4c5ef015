pub mod account;
pub mod document;
pub mod employee;
pub mod enums;
pub mod job;
pub mod organization;
pub mod reminder;
pub mod request;
pub mod rule;
pub mod storage;
pub mod validation;

pub use account::*;
pub use document::*;
pub use employee::*;
pub use job::*;
pub use organization::*;
pub use reminder::*;
pub use request::*;
pub use rule::*;
pub use storage::*;
pub use validation::*;
