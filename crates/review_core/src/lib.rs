pub mod domain;
pub mod highlight;
pub mod input;
pub mod lifecycle;
pub mod memory;
pub mod notify;
pub mod pdf;
pub mod ports;
pub mod service;
pub mod token;
pub mod validation;

pub use domain::{Highlight, HighlightKind, HighlightStatus, ReviewDecision, ReviewRequest, Role};
pub use input::{CreateRequestInput, DecisionInput, HighlightInput, ReviewInput};
pub use lifecycle::RequestState;
pub use ports::{
    DatabaseService, Notification, NotificationService, PageSnapshotService, PdfStorageService, PortError,
    PortResult,
};
pub use service::{AccessGrant, ErrorCode, RequestView, ReviewWorkflow, WorkflowError};
pub use token::{AccessToken, TokenCodec};
