mod address;
mod error;
mod requests;
mod types;

pub use address::Address;
pub use error::ValidationError;
pub use requests::{
    normalize_email, CommentRequest, CreatePropertyRequest, CreateTenantRequest,
    CreateWorkOrderRequest, InviteManagerRequest, InviteTechnicianRequest, TenantProperty,
    MAX_COMMENT_LENGTH, MAX_ISSUE_LENGTH, MAX_NAME_LENGTH,
};
pub use types::{
    sortable_id, ActorContext, AddressSnapshot, AssigneeRef, Event, EventParent, InviteStatus,
    PermissionToEnter, Property, Role, Technician, TechnicianLink, UpdateType, User, WorkOrder,
    WorkOrderStatus,
};
