pub mod blob;
pub mod db;
pub mod error;
pub mod uploader;

pub use blob::StorageClient;
pub use db::DbClient;
pub use error::StoreError;
pub use uploader::MsgUploader;
