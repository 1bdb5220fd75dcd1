//! # Route Modules
//!
//! | Route | Module |
//! |-------|--------|
//! | `POST /his/services/update/{resource_id}/` | [`update`] |

pub mod update;
