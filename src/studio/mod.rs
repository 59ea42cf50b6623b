// Studio - image pools, request building and transfers for the three image tabs

pub mod api;
pub mod download;
pub mod error;
pub mod notice;
pub mod pool;
pub mod progress;
pub mod request;
pub mod selection;
pub mod session;
pub mod transfer;
pub mod types;
pub mod upload;

pub use api::{ApiConfig, HttpImageApi, ImageApi};
pub use download::{DirectorySaver, ImageSaver};
pub use error::{Result, StudioError, ValidationError};
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use pool::{IdGenerator, ImagePool};
pub use progress::{
    Clock, ManualClock, Overlay, ProgressConfig, ProgressSimulator, ProgressStage, ProgressState,
    SystemClock,
};
pub use request::{
    ComposeRequest, EditImage, EditRequest, GenerateRequest, ImageRequest, TabForm,
};
pub use selection::SelectionSet;
pub use session::{PendingRequest, PoolKind, Studio, Ticket};
pub use transfer::{FetchedImage, HttpFetcher, SourceFetcher};
pub use upload::UploadPolicy;
pub use types::*;
