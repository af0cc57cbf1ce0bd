//! Filtering and ordering of the cached project list

use std::cmp::Ordering;

use feruca::Collator;
use serde::{Deserialize, Serialize};

use super::entity::Project;

/// Search terms shorter than this (in characters) apply no filter
pub const MIN_SEARCH_LEN: usize = 3;

/// Sort mode of the project view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    /// Ascending by name
    #[default]
    Alphabetical,
    /// Most recent start date first
    Recent,
    /// Earliest end date first
    EndingSoon,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Alphabetical => "alphabetical",
            SortBy::Recent => "recent",
            SortBy::EndingSoon => "endingSoon",
        }
    }

    pub fn all() -> [SortBy; 3] {
        [SortBy::Alphabetical, SortBy::Recent, SortBy::EndingSoon]
    }
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortBy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "alphabetical" | "name" => Ok(SortBy::Alphabetical),
            "recent" => Ok(SortBy::Recent),
            "endingsoon" => Ok(SortBy::EndingSoon),
            _ => anyhow::bail!(
                "Invalid sort mode '{}'. Must be one of: alphabetical, recent, endingSoon",
                s
            ),
        }
    }
}

/// The three inputs of the derived view besides the list itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub search_term: String,
    pub favorites_only: bool,
    pub sort_by: SortBy,
}

impl ViewOptions {
    /// Search term in effect, or `None` when it is too short to filter
    pub fn active_search(&self) -> Option<&str> {
        (self.search_term.chars().count() >= MIN_SEARCH_LEN).then_some(self.search_term.as_str())
    }
}

/// Filter and sort `projects` without touching the input
pub fn filter_and_sort(projects: &[Project], options: &ViewOptions) -> Vec<Project> {
    let search = options.active_search().map(str::to_lowercase);

    let mut view: Vec<Project> = projects
        .iter()
        .filter(|p| match &search {
            Some(term) => {
                p.name.to_lowercase().contains(term.as_str())
                    || p.client.to_lowercase().contains(term.as_str())
            }
            None => true,
        })
        .filter(|p| !options.favorites_only || p.is_favorite)
        .cloned()
        .collect();

    // slice::sort_by is stable; ties keep list order
    match options.sort_by {
        SortBy::Alphabetical => {
            let mut collator = Collator::default();
            view.sort_by(|a, b| collate_names(&mut collator, &a.name, &b.name));
        }
        SortBy::Recent => view.sort_by_key(|p| {
            std::cmp::Reverse(p.start_date.as_ref().and_then(|d| d.millis()).unwrap_or(i64::MIN))
        }),
        SortBy::EndingSoon => view.sort_by_key(|p| {
            p.end_date.as_ref().and_then(|d| d.millis()).unwrap_or(i64::MAX)
        }),
    }
    view
}

/// Unicode collation order (CLDR root), so accented letters sort with their base letter
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    collate_names(&mut Collator::default(), a, b)
}

fn collate_names(collator: &mut Collator, a: &str, b: &str) -> Ordering {
    collator
        .collate(a, b)
        .then_with(|| case_fold_compare(a, b))
}

/// Case-insensitive ordering; on a tie lower case sorts before upper case
fn case_fold_compare(a: &str, b: &str) -> Ordering {
    let primary = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    if primary != Ordering::Equal {
        return primary;
    }

    for (x, y) in a.chars().zip(b.chars()) {
        match (x.is_lowercase(), y.is_lowercase()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::DateValue;

    fn project(id: &str, name: &str, client: &str) -> Project {
        Project {
            id: id.to_string(),
            name: name.to_string(),
            client: client.to_string(),
            start_date: None,
            end_date: None,
            is_favorite: false,
            cover_image_url: None,
        }
    }

    fn names(view: &[Project]) -> Vec<&str> {
        view.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_sort_by_parse_and_display() {
        for mode in SortBy::all() {
            assert_eq!(mode.to_string().parse::<SortBy>().unwrap(), mode);
        }
        assert_eq!("ending-soon".parse::<SortBy>().unwrap(), SortBy::EndingSoon);
        assert!("newest".parse::<SortBy>().is_err());
    }

    #[test]
    fn test_short_search_term_does_not_filter() {
        let projects = vec![project("1", "Website", "Acme"), project("2", "App", "Globex")];

        let short = ViewOptions {
            search_term: "ab".to_string(),
            ..Default::default()
        };
        assert_eq!(
            filter_and_sort(&projects, &short),
            filter_and_sort(&projects, &ViewOptions::default())
        );

        let active = ViewOptions {
            search_term: "glo".to_string(),
            ..Default::default()
        };
        assert_eq!(names(&filter_and_sort(&projects, &active)), vec!["App"]);
    }

    #[test]
    fn test_search_matches_name_or_client_case_insensitively() {
        let projects = vec![
            project("1", "Website Redesign", "Acme"),
            project("2", "Mobile", "WEBCORP"),
            project("3", "Other", "Initech"),
        ];
        let options = ViewOptions {
            search_term: "web".to_string(),
            ..Default::default()
        };

        let view = filter_and_sort(&projects, &options);
        assert_eq!(names(&view), vec!["Mobile", "Website Redesign"]);
    }

    #[test]
    fn test_favorites_only() {
        let mut fav = project("1", "Fav", "x");
        fav.is_favorite = true;
        let projects = vec![fav, project("2", "Plain", "x")];
        let options = ViewOptions {
            favorites_only: true,
            ..Default::default()
        };

        assert_eq!(names(&filter_and_sort(&projects, &options)), vec!["Fav"]);
    }

    #[test]
    fn test_alphabetical_and_recent_order() {
        let mut zeta = project("1", "Zeta", "x");
        zeta.start_date = Some(DateValue::from("2024-01-01"));
        let mut alpha = project("2", "Alpha", "x");
        alpha.start_date = Some(DateValue::from("2024-06-01"));
        let projects = vec![zeta, alpha];

        let alphabetical = ViewOptions::default();
        assert_eq!(names(&filter_and_sort(&projects, &alphabetical)), vec!["Alpha", "Zeta"]);

        let recent = ViewOptions {
            sort_by: SortBy::Recent,
            ..Default::default()
        };
        assert_eq!(names(&filter_and_sort(&projects, &recent)), vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_missing_dates_sort_last() {
        let mut dated = project("1", "Dated", "x");
        dated.start_date = Some(DateValue::from("2023-03-01"));
        dated.end_date = Some(DateValue::from("2023-04-01"));
        let mut garbled = project("2", "Garbled", "x");
        garbled.start_date = Some(DateValue::from("soon"));
        garbled.end_date = Some(DateValue::from("later"));
        let undated = project("3", "Undated", "x");
        let mut early = project("4", "Early", "x");
        early.start_date = Some(DateValue::from("2022-01-01"));
        early.end_date = Some(DateValue::from("2022-02-01"));
        let projects = vec![garbled, undated, dated, early];

        let recent = ViewOptions {
            sort_by: SortBy::Recent,
            ..Default::default()
        };
        assert_eq!(
            names(&filter_and_sort(&projects, &recent)),
            vec!["Dated", "Early", "Garbled", "Undated"]
        );

        let ending = ViewOptions {
            sort_by: SortBy::EndingSoon,
            ..Default::default()
        };
        assert_eq!(
            names(&filter_and_sort(&projects, &ending)),
            vec!["Early", "Dated", "Garbled", "Undated"]
        );
    }

    #[test]
    fn test_locale_compare() {
        assert_eq!(locale_compare("alpha", "Beta"), Ordering::Less);
        assert_eq!(locale_compare("Zeta", "alpha"), Ordering::Greater);
        assert_eq!(locale_compare("apple", "Apple"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
        assert_eq!(locale_compare("Émile", "Zoe"), Ordering::Less);
        assert_eq!(locale_compare("Ana", "Ângelo"), Ordering::Less);
    }

    #[test]
    fn test_alphabetical_sorts_accented_names_with_base_letter() {
        let projects = vec![
            project("1", "Zoe", "x"),
            project("2", "Émile", "x"),
            project("3", "Ana", "x"),
            project("4", "Ângelo", "x"),
            project("5", "érica", "x"),
        ];

        let view = filter_and_sort(&projects, &ViewOptions::default());

        assert_eq!(names(&view), vec!["Ana", "Ângelo", "Émile", "érica", "Zoe"]);
    }
}
