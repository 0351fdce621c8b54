/// Purpose of an upload. Each purpose gets its own folder on the image host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFolder {
    QrCodes,
    Profiles,
}

impl ImageFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFolder::QrCodes => "qr-codes",
            ImageFolder::Profiles => "profiles",
        }
    }
}

/// A file received in a multipart form, held in memory until it is forwarded.
#[derive(Clone, Debug)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
