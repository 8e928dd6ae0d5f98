//! Backend of the EduGrade gradebook: an encrypted per-account document vault and
//! PIN-gated, read-only class shares for students.

pub mod clock;
pub mod config;
pub mod data_cache;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweeper;

pub mod crypto {
    pub mod aes;
    pub mod codec;
    pub mod password;
    pub mod pin;
    pub mod tokens;
    pub mod vault;
}

pub mod models {
    pub mod account;
    pub mod document;
    pub mod session;
    pub mod share;
    pub mod store;
    pub mod timestamp;
}

pub mod repositories {
    pub mod account;
    pub mod share;
}

pub mod services {
    pub mod auth;
    pub mod data;
    pub mod pin_auth;
    pub mod sessions;
    pub mod shares;
}

pub mod handlers {
    pub mod auth;
    pub mod data;
    pub mod grades;
    pub mod shares;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
}

#[cfg(test)]
mod testutil;
