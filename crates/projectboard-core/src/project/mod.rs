//! Projects: the entity, its derived view, and the repository that caches them

pub mod cover;
pub mod entity;
pub mod repository;
pub mod state;
pub mod view;

pub use cover::CoverCleanup;
pub use entity::{
    COLLECTION, CoverImage, DateValue, Project, ProjectData, ProjectPatch, parse_date_text,
};
pub use repository::ProjectRepository;
pub use state::{ProjectState, StateSummary};
pub use view::{MIN_SEARCH_LEN, SortBy, ViewOptions, filter_and_sort, locale_compare};
