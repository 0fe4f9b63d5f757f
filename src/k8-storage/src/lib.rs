mod backend;
mod error;
mod in_memory;
mod options;
mod selector;

pub use backend::ListArg;
pub use backend::ListResult;
pub use backend::NameSpace;
pub use backend::SharedBackend;
pub use backend::StorageBackend;
pub use error::StorageError;
pub use in_memory::InMemoryStorage;
pub use options::RestOptions;
pub use options::RestOptionsGetter;
pub use options::StorageFactory;
pub use selector::Requirement;
pub use selector::SelectionPredicate;
pub use selector::Selector;
pub use selector::SelectorError;
pub use selector::Set;
