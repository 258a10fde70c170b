//! Per-route access requirements used by the route table.

use crate::services::auth::RequiredAttributes;
use crate::services::users::{
    COMMITTEE_ADMIN, COMMITTEE_CORPORATE, COMMITTEE_TOP4, MARK_RECRUITER, VALID_MARKS,
};

/// Any member holding a valid mark.
pub fn member() -> RequiredAttributes {
    RequiredAttributes::new().marks(VALID_MARKS)
}

pub fn user_directory() -> RequiredAttributes {
    RequiredAttributes::new()
        .marks([MARK_RECRUITER])
        .committees([COMMITTEE_TOP4, COMMITTEE_ADMIN])
}

pub fn user_admin() -> RequiredAttributes {
    RequiredAttributes::new().committees([COMMITTEE_TOP4, COMMITTEE_ADMIN])
}

pub fn resume_book() -> RequiredAttributes {
    RequiredAttributes::new()
        .marks([MARK_RECRUITER])
        .committees([COMMITTEE_TOP4, COMMITTEE_CORPORATE, COMMITTEE_ADMIN])
}

pub fn corporate_staff() -> RequiredAttributes {
    RequiredAttributes::new().committees([COMMITTEE_TOP4, COMMITTEE_CORPORATE, COMMITTEE_ADMIN])
}
