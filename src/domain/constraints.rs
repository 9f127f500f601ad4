//! Platform limits shared by validation, services and storage.

use std::ops::RangeInclusive;

use time::Duration;

use super::types::PageKind;

pub const MAX_PAGING_LIMIT: i64 = 40;

pub const SEARCH_QUERY_CHARS: RangeInclusive<usize> = 1..=35;

pub mod posts {
    use super::*;

    pub const TITLE_CHARS: RangeInclusive<usize> = 8..=120;
    pub const DESCRIPTION_CHARS: RangeInclusive<usize> = 25..=300;
    pub const TOPICS: RangeInclusive<usize> = 2..=5;
    pub const PAGES: RangeInclusive<usize> = 1..=6;
    pub const MAX_FILE_SIZE_BYTES: usize = 20 * 1024 * 1024;
    pub const RATING: RangeInclusive<i32> = 1..=5;
    pub const FEED_SIZE: i64 = 15;
    pub const TRENDING_SIZE: i64 = 20;
}

pub mod quiz {
    use super::*;

    pub const TEXT_CHARS: RangeInclusive<usize> = 2..=50;
    pub const ANSWER_CHARS: RangeInclusive<usize> = 1..=50;
    pub const QUESTIONS: RangeInclusive<usize> = 1..=10;
    pub const ANSWERS: RangeInclusive<usize> = 2..=6;
}

pub mod users {
    use super::*;

    pub const NAME_CHARS: RangeInclusive<usize> = 4..=30;
    pub const NAME_COOLDOWN: Duration = Duration::days(31);
    pub const IMAGE_COOLDOWN: Duration = Duration::days(7);
    pub const MAX_PICTURE_BYTES: usize = 20 * 1024 * 1024;
}

pub mod feeds {
    use super::*;

    pub const NAME_CHARS: RangeInclusive<usize> = 1..=20;
    pub const MAX_TOPICS: usize = 8;
    pub const MAX_AUTHORS: usize = 8;
}

pub mod topics {
    use super::*;

    pub const NAME_CHARS: RangeInclusive<usize> = 2..=30;
    pub const TOP_AUTHORS: i64 = 20;
    pub const RANDOM_SAMPLE: i64 = 10;
}

pub mod auth {
    use super::*;

    pub const SESSION_TTL: Duration = Duration::days(1);
}

/// A content type accepted for post pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFileType {
    pub mime: &'static str,
    pub extension: &'static str,
    pub kind: PageKind,
}

pub const QUIZ_MIME: &str = "application/json+quiz";

pub const PAGE_FILE_TYPES: &[PageFileType] = &[
    PageFileType {
        mime: "application/pdf",
        extension: "pdf",
        kind: PageKind::Pdf,
    },
    PageFileType {
        mime: QUIZ_MIME,
        extension: "quiz.json",
        kind: PageKind::Quiz,
    },
    PageFileType {
        mime: "text/markdown",
        extension: "md",
        kind: PageKind::Markdown,
    },
    PageFileType {
        mime: "image/jpeg",
        extension: "jpeg",
        kind: PageKind::Image,
    },
    PageFileType {
        mime: "image/png",
        extension: "png",
        kind: PageKind::Image,
    },
    PageFileType {
        mime: "image/jpg",
        extension: "jpg",
        kind: PageKind::Image,
    },
    PageFileType {
        mime: "image/gif",
        extension: "gif",
        kind: PageKind::Image,
    },
];

pub fn page_type_for_mime(mime: &str) -> Option<&'static PageFileType> {
    PAGE_FILE_TYPES.iter().find(|candidate| candidate.mime == mime)
}

/// Resolve a stored file name back to its page type by extension suffix.
pub fn page_type_for_file_name(file_name: &str) -> Option<&'static PageFileType> {
    PAGE_FILE_TYPES
        .iter()
        .find(|candidate| file_name.ends_with(&format!(".{}", candidate.extension)))
}
