pub mod uploads {

    /// Largest accepted image upload (posts and avatars), in bytes.
    pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

    pub const ALLOWED_IMAGE_MIME: &[&str] = &["image/jpeg", "image/png", "image/gif"];
}

pub mod pagination {

    pub const DEFAULT_PER_PAGE: u64 = 5;

    pub const MAX_PER_PAGE: u64 = 100;
}

pub mod auth {

    pub const MIN_PASSWORD_LEN: usize = 6;

    /// Session key holding the logged-in identity.
    pub const SESSION_USER_KEY: &str = "user";
}
