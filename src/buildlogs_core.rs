//! Core domain types, the filter engine and entry sources.

pub mod types {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Serialize};

    use crate::status::Status;

    /// One build log entry.
    ///
    /// Entries are loaded once and never mutated afterwards.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LogEntry {
        pub date: String,
        pub title: String,
        pub content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub project: Option<String>,
        #[serde(default)]
        pub tags: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub status: Option<Status>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub impact: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub challenges: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub next_steps: Vec<String>,
    }

    impl LogEntry {
        pub fn new(date: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
            Self {
                date: date.into(),
                title: title.into(),
                content: content.into(),
                project: None,
                tags: Vec::new(),
                status: None,
                impact: None,
                challenges: Vec::new(),
                next_steps: Vec::new(),
            }
        }

        /// Treat empty optional strings as absent.
        pub fn normalized(mut self) -> Self {
            if self.project.as_deref().is_some_and(str::is_empty) {
                self.project = None;
            }
            if self.impact.as_deref().is_some_and(str::is_empty) {
                self.impact = None;
            }
            self
        }

        pub fn display_date(&self) -> String {
            format_date(&self.date)
        }

        /// Full plain-text rendering, used for list output and clipboard yanks.
        pub fn detail_text(&self) -> String {
            let mut out = String::new();
            out.push_str(&self.title);
            out.push('\n');
            out.push_str(&self.display_date());
            if let Some(project) = &self.project {
                out.push_str(" · ");
                out.push_str(project);
            }
            if let Some(status) = self.status {
                out.push_str(" · ");
                out.push_str(status.as_str());
            }
            out.push_str("\n\nDescription\n");
            out.push_str(&self.content);
            out.push('\n');
            if let Some(impact) = &self.impact {
                out.push_str("\nImpact\n");
                out.push_str(impact);
                out.push('\n');
            }
            push_bullets(&mut out, "Challenges", &self.challenges);
            push_bullets(&mut out, "Next Steps", &self.next_steps);
            if !self.tags.is_empty() {
                out.push('\n');
                out.push_str(&self.tags.join(", "));
                out.push('\n');
            }
            out
        }
    }

    fn push_bullets(out: &mut String, heading: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        out.push('\n');
        out.push_str(heading);
        out.push('\n');
        for item in items {
            out.push_str("• ");
            out.push_str(item);
            out.push('\n');
        }
    }

    pub const INVALID_DATE: &str = "Invalid Date";

    /// Format an ISO date as `May 10, 2025`.
    ///
    /// Full RFC 3339 timestamps are accepted and reduced to their calendar date.
    pub fn format_date(value: &str) -> String {
        let trimmed = value.trim();
        let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()));
        match date {
            Some(date) => date.format("%b %-d, %Y").to_string(),
            None => INVALID_DATE.to_string(),
        }
    }
}

pub mod filters {
    use std::fmt;
    use std::str::FromStr;

    use memchr::{memchr, memchr2};

    use super::types::LogEntry;
    use crate::status::{Status, UnknownStatus};

    /// Project dropdown value.
    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    pub enum ProjectFilter {
        #[default]
        All,
        Only(String),
    }

    impl ProjectFilter {
        pub fn matches(&self, project: Option<&str>) -> bool {
            match self {
                Self::All => true,
                Self::Only(expected) => project == Some(expected.as_str()),
            }
        }
    }

    impl fmt::Display for ProjectFilter {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::All => f.write_str("All Projects"),
                Self::Only(project) => f.write_str(project),
            }
        }
    }

    impl FromStr for ProjectFilter {
        type Err = std::convert::Infallible;

        fn from_str(value: &str) -> Result<Self, Self::Err> {
            if value.eq_ignore_ascii_case("all") {
                Ok(Self::All)
            } else {
                Ok(Self::Only(value.to_string()))
            }
        }
    }

    /// Status dropdown value.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub enum StatusFilter {
        #[default]
        All,
        Only(Status),
    }

    impl StatusFilter {
        pub fn matches(self, status: Option<Status>) -> bool {
            match self {
                Self::All => true,
                Self::Only(expected) => status == Some(expected),
            }
        }
    }

    impl fmt::Display for StatusFilter {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::All => f.write_str("All Status"),
                Self::Only(status) => f.write_str(status.label()),
            }
        }
    }

    impl FromStr for StatusFilter {
        type Err = UnknownStatus;

        fn from_str(value: &str) -> Result<Self, Self::Err> {
            if value.trim().eq_ignore_ascii_case("all") {
                return Ok(Self::All);
            }
            value.parse().map(Self::Only)
        }
    }

    /// Search text plus both dropdown selections.
    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    pub struct Filters {
        pub query: String,
        pub project: ProjectFilter,
        pub status: StatusFilter,
    }

    impl Filters {
        pub fn is_default(&self) -> bool {
            self.query.is_empty()
                && self.project == ProjectFilter::All
                && self.status == StatusFilter::All
        }

        pub fn matches(&self, entry: &LogEntry) -> bool {
            self.matches_with(entry, &QueryMatcher::new(&self.query))
        }

        /// Matching entries in source order.
        pub fn apply<'a>(&self, entries: &'a [LogEntry]) -> Vec<&'a LogEntry> {
            let query = QueryMatcher::new(&self.query);
            entries.iter().filter(|entry| self.matches_with(entry, &query)).collect()
        }

        /// Positions of matching entries in `entries`, ascending.
        pub fn indices(&self, entries: &[LogEntry]) -> Vec<usize> {
            let query = QueryMatcher::new(&self.query);
            entries
                .iter()
                .enumerate()
                .filter_map(|(idx, entry)| self.matches_with(entry, &query).then_some(idx))
                .collect()
        }

        fn matches_with(&self, entry: &LogEntry, query: &QueryMatcher) -> bool {
            self.project.matches(entry.project.as_deref())
                && self.status.matches(entry.status)
                && query.matches_entry(entry)
        }
    }

    /// Lowercased query compiled once per filter pass.
    #[derive(Debug)]
    struct QueryMatcher {
        needle: String,
    }

    impl QueryMatcher {
        fn new(query: &str) -> Self {
            Self { needle: query.to_lowercase() }
        }

        fn matches_entry(&self, entry: &LogEntry) -> bool {
            self.matches_text(&entry.title)
                || self.matches_text(&entry.content)
                || entry.tags.iter().any(|tag| self.matches_text(tag))
        }

        fn matches_text(&self, haystack: &str) -> bool {
            if self.needle.is_empty() {
                return true;
            }
            if self.needle.is_ascii() && haystack.is_ascii() {
                return contains_ascii_case_insensitive(haystack.as_bytes(), self.needle.as_bytes());
            }
            haystack.to_lowercase().contains(&self.needle)
        }
    }

    /// Distinct projects in first-occurrence order; entries without a project are skipped.
    pub fn distinct_projects(entries: &[LogEntry]) -> Vec<String> {
        let mut projects: Vec<String> = Vec::new();
        for project in entries.iter().filter_map(|entry| entry.project.as_deref()) {
            if !projects.iter().any(|seen| seen == project) {
                projects.push(project.to_string());
            }
        }
        projects
    }

    /// `needle_lower` must already be ASCII-lowercase.
    pub(crate) fn contains_ascii_case_insensitive(haystack: &[u8], needle_lower: &[u8]) -> bool {
        if needle_lower.is_empty() {
            return true;
        }
        if needle_lower.len() > haystack.len() {
            return false;
        }

        let first = needle_lower[0];
        let first_upper = first.to_ascii_uppercase();
        let find_first = |slice: &[u8]| {
            if first_upper == first {
                memchr(first, slice)
            } else {
                memchr2(first, first_upper, slice)
            }
        };

        let mut base = 0usize;
        while let Some(pos) = find_first(&haystack[base..]) {
            let start = base + pos;
            let Some(candidate) = haystack.get(start..start + needle_lower.len()) else {
                return false;
            };
            if candidate.iter().zip(needle_lower).all(|(h, n)| h.to_ascii_lowercase() == *n) {
                return true;
            }
            base = start + 1;
        }
        false
    }
}

pub mod source {
    use std::path::{Path, PathBuf};

    use super::types::LogEntry;

    const BUILTIN_ENTRIES: &str = include_str!("../data/build_logs.json");

    #[derive(Debug, thiserror::Error)]
    pub enum SourceError {
        #[error("failed to read data file {path}: {source}")]
        Read { path: PathBuf, source: std::io::Error },
        #[error("failed to parse data file {path}: {source}")]
        Parse { path: PathBuf, source: serde_json::Error },
        #[error("built-in entries are malformed: {0}")]
        Builtin(#[source] serde_json::Error),
    }

    /// Read-only provider of the entry list.
    pub trait EntrySource {
        fn load(&self) -> Result<Vec<LogEntry>, SourceError>;

        /// Short label for logs.
        fn describe(&self) -> String;
    }

    /// Entries compiled into the binary.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct BuiltinSource;

    impl EntrySource for BuiltinSource {
        fn load(&self) -> Result<Vec<LogEntry>, SourceError> {
            parse_entries(BUILTIN_ENTRIES).map_err(SourceError::Builtin)
        }

        fn describe(&self) -> String {
            "built-in".to_string()
        }
    }

    /// A JSON array of entries on disk, read once.
    #[derive(Debug, Clone)]
    pub struct JsonFileSource {
        path: PathBuf,
    }

    impl JsonFileSource {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl EntrySource for JsonFileSource {
        fn load(&self) -> Result<Vec<LogEntry>, SourceError> {
            let contents = std::fs::read_to_string(&self.path)
                .map_err(|source| SourceError::Read { path: self.path.clone(), source })?;
            parse_entries(&contents)
                .map_err(|source| SourceError::Parse { path: self.path.clone(), source })
        }

        fn describe(&self) -> String {
            self.path.display().to_string()
        }
    }

    pub fn parse_entries(json: &str) -> Result<Vec<LogEntry>, serde_json::Error> {
        let entries: Vec<LogEntry> = serde_json::from_str(json)?;
        Ok(entries.into_iter().map(LogEntry::normalized).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::filters::{
        contains_ascii_case_insensitive, distinct_projects, Filters, ProjectFilter, StatusFilter,
    };
    use super::source::{parse_entries, BuiltinSource, EntrySource, JsonFileSource, SourceError};
    use super::types::{format_date, LogEntry, INVALID_DATE};
    use crate::status::Status;
    use rstest::{fixture, rstest};

    #[fixture]
    fn builtin() -> Vec<LogEntry> {
        BuiltinSource.load().expect("built-in entries parse")
    }

    #[fixture]
    fn mixed() -> Vec<LogEntry> {
        let mut tagged = LogEntry::new("2024-01-02", "Tagged only", "nothing here");
        tagged.tags = vec!["Rust".to_string(), "Rust".to_string()];
        tagged.project = Some("Alpha".to_string());

        let mut orphan = LogEntry::new("2024-01-03", "No project", "Line one\nline TWO");
        orphan.status = Some(Status::Planned);

        let mut second_alpha = LogEntry::new("2024-01-04", "Alpha again", "more");
        second_alpha.project = Some("Alpha".to_string());
        second_alpha.status = Some(Status::Completed);

        let mut beta = LogEntry::new("2024-01-05", "Beta", "Ünïcode-Straße");
        beta.project = Some("Beta".to_string());

        vec![tagged, orphan, second_alpha, beta]
    }

    fn titles(entries: &[&LogEntry]) -> Vec<String> {
        entries.iter().map(|entry| entry.title.clone()).collect()
    }

    #[rstest]
    fn builtin_entries_load_in_source_order(builtin: Vec<LogEntry>) {
        assert_eq!(builtin.len(), 4);
        assert_eq!(builtin[0].project.as_deref(), Some("Password Manager"));
        assert_eq!(builtin[3].project.as_deref(), Some("Store-IT"));
        assert_eq!(builtin[1].next_steps.len(), 2);
    }

    #[rstest]
    fn query_webrtc_matches_only_meetsync(builtin: Vec<LogEntry>) {
        let filters = Filters { query: "webrtc".to_string(), ..Filters::default() };
        let result = filters.apply(&builtin);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].project.as_deref(), Some("MeetSync"));
    }

    #[rstest]
    fn project_filter_selects_store_it(builtin: Vec<LogEntry>) {
        let filters = Filters {
            project: ProjectFilter::Only("Store-IT".to_string()),
            ..Filters::default()
        };
        let result = filters.apply(&builtin);
        assert_eq!(titles(&result), vec!["Deployed Store-IT | Cloud Storage Platform"]);
    }

    #[rstest]
    fn status_filter_in_progress_selects_meetsync(builtin: Vec<LogEntry>) {
        let filters = Filters { status: StatusFilter::Only(Status::InProgress), ..Filters::default() };
        let result = filters.apply(&builtin);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].project.as_deref(), Some("MeetSync"));
        assert_eq!(
            result[0].challenges,
            vec!["WebRTC connection stability".to_string(), "Scalable signaling server".to_string()]
        );
    }

    #[rstest]
    fn unmatched_query_yields_empty_result(builtin: Vec<LogEntry>) {
        let filters = Filters { query: "zzzznotfound".to_string(), ..Filters::default() };
        assert!(filters.apply(&builtin).is_empty());
        assert!(filters.indices(&builtin).is_empty());
    }

    #[rstest]
    fn substrings_of_any_field_match(builtin: Vec<LogEntry>) {
        for (idx, entry) in builtin.iter().enumerate() {
            let mut needles = vec![
                entry.title[..entry.title.len().min(6)].to_uppercase(),
                entry.content.chars().skip(entry.content.chars().count() / 2).collect(),
            ];
            needles.extend(entry.tags.iter().map(|tag| tag.to_lowercase()));
            for needle in needles {
                let filters = Filters { query: needle.clone(), ..Filters::default() };
                assert!(filters.indices(&builtin).contains(&idx), "{needle:?} should match #{idx}");
            }
        }
    }

    #[rstest]
    fn empty_query_matches_everything(mixed: Vec<LogEntry>) {
        let filters = Filters::default();
        assert!(filters.is_default());
        assert_eq!(filters.indices(&mixed), vec![0, 1, 2, 3]);
    }

    #[rstest]
    fn query_is_not_trimmed(mixed: Vec<LogEntry>) {
        let filters = Filters { query: " ".to_string(), ..Filters::default() };
        // "Beta" has no space anywhere.
        assert_eq!(filters.indices(&mixed), vec![0, 1, 2]);
    }

    #[rstest]
    fn project_filter_never_matches_entries_without_project(mixed: Vec<LogEntry>) {
        let filters = Filters { project: ProjectFilter::Only("Alpha".to_string()), ..Filters::default() };
        let result = filters.apply(&mixed);
        assert_eq!(titles(&result), vec!["Tagged only", "Alpha again"]);
        assert!(result.iter().all(|entry| entry.project.as_deref() == Some("Alpha")));
    }

    #[rstest]
    fn project_filter_is_case_sensitive(mixed: Vec<LogEntry>) {
        let filters = Filters { project: ProjectFilter::Only("alpha".to_string()), ..Filters::default() };
        assert!(filters.apply(&mixed).is_empty());
    }

    #[rstest]
    fn criteria_combine_with_and(mixed: Vec<LogEntry>) {
        let filters = Filters {
            query: "again".to_string(),
            project: ProjectFilter::Only("Alpha".to_string()),
            status: StatusFilter::Only(Status::Completed),
        };
        assert_eq!(filters.indices(&mixed), vec![2]);

        let filters = Filters { status: StatusFilter::Only(Status::Planned), ..filters };
        assert!(filters.indices(&mixed).is_empty());
    }

    #[rstest]
    fn content_line_breaks_are_searchable(mixed: Vec<LogEntry>) {
        let filters = Filters { query: "one\nLINE two".to_string(), ..Filters::default() };
        assert_eq!(filters.indices(&mixed), vec![1]);
    }

    #[rstest]
    fn unicode_queries_fold_case(mixed: Vec<LogEntry>) {
        let filters = Filters { query: "STRASSE".to_string(), ..Filters::default() };
        assert!(filters.indices(&mixed).is_empty());
        let filters = Filters { query: "ÜNÏ".to_string(), ..Filters::default() };
        assert_eq!(filters.indices(&mixed), vec![3]);
    }

    #[rstest]
    fn filtering_is_idempotent(builtin: Vec<LogEntry>) {
        let filters = Filters {
            query: "next".to_string(),
            status: StatusFilter::Only(Status::Completed),
            ..Filters::default()
        };
        let once: Vec<LogEntry> = filters.apply(&builtin).into_iter().cloned().collect();
        let twice: Vec<LogEntry> = filters.apply(&once).into_iter().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[rstest]
    fn distinct_projects_keep_first_occurrence_order(mixed: Vec<LogEntry>, builtin: Vec<LogEntry>) {
        assert_eq!(distinct_projects(&mixed), vec!["Alpha".to_string(), "Beta".to_string()]);
        assert_eq!(
            distinct_projects(&builtin),
            vec!["Password Manager", "HireGenius", "MeetSync", "Store-IT"]
        );
    }

    #[rstest]
    #[case("all", StatusFilter::All)]
    #[case("ALL", StatusFilter::All)]
    #[case("completed", StatusFilter::Only(Status::Completed))]
    #[case("in-progress", StatusFilter::Only(Status::InProgress))]
    fn status_filter_parses(#[case] input: &str, #[case] expected: StatusFilter) {
        assert_eq!(input.parse::<StatusFilter>(), Ok(expected));
    }

    #[test]
    fn project_filter_parses_all_sentinel() {
        assert_eq!("All".parse::<ProjectFilter>(), Ok(ProjectFilter::All));
        assert_eq!(
            "Store-IT".parse::<ProjectFilter>(),
            Ok(ProjectFilter::Only("Store-IT".to_string()))
        );
        assert!("shipped".parse::<StatusFilter>().is_err());
    }

    #[rstest]
    #[case(b"Hello World", b"world", true)]
    #[case(b"Hello World", b"o w", true)]
    #[case(b"Hello", b"hello!", false)]
    #[case(b"aaab", b"ab", true)]
    #[case(b"abc", b"", true)]
    #[case(b"WebRTC", b"rtc", true)]
    #[case(b"WebRTC", b"rtx", false)]
    fn ascii_scan(#[case] haystack: &[u8], #[case] needle: &[u8], #[case] expected: bool) {
        assert_eq!(contains_ascii_case_insensitive(haystack, needle), expected);
    }

    #[rstest]
    #[case("2025-05-10", "May 10, 2025")]
    #[case("2025-07-26", "Jul 26, 2025")]
    #[case("2025-08-09", "Aug 9, 2025")]
    #[case("2025-08-09T23:30:00-05:00", "Aug 9, 2025")]
    #[case("yesterday", INVALID_DATE)]
    #[case("2025-13-01", INVALID_DATE)]
    fn formats_dates(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_date(input), expected);
    }

    #[test]
    fn parse_entries_normalizes_empty_optionals() {
        let json = r#"[{"date":"2024-01-01","title":"t","content":"c","project":"","impact":"","tags":["a"]}]"#;
        let entries = parse_entries(json).unwrap();
        assert_eq!(entries[0].project, None);
        assert_eq!(entries[0].impact, None);
        assert!(entries[0].challenges.is_empty());
        assert!(distinct_projects(&entries).is_empty());
    }

    #[test]
    fn parse_entries_rejects_unknown_status() {
        let json = r#"[{"date":"2024-01-01","title":"t","content":"c","status":"shipped"}]"#;
        assert!(parse_entries(json).is_err());
    }

    #[test]
    fn json_file_source_reports_path_on_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = JsonFileSource::new(temp.path().join("missing.json"));
        assert!(matches!(missing.load(), Err(SourceError::Read { .. })));

        let broken_path = temp.path().join("broken.json");
        std::fs::write(&broken_path, "{").expect("write");
        let broken = JsonFileSource::new(&broken_path);
        let err = broken.load().unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[rstest]
    fn json_file_source_round_trips_builtin(builtin: Vec<LogEntry>) {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("logs.json");
        std::fs::write(&path, serde_json::to_string_pretty(&builtin).unwrap()).expect("write");
        let loaded = JsonFileSource::new(&path).load().expect("load");
        assert_eq!(loaded, builtin);
    }

    #[rstest]
    fn detail_text_skips_absent_sections(mixed: Vec<LogEntry>, builtin: Vec<LogEntry>) {
        let text = mixed[1].detail_text();
        assert!(text.starts_with("No project\nJan 3, 2024 · planned"));
        assert!(!text.contains("Impact"));
        assert!(!text.contains("Challenges"));

        let text = builtin[2].detail_text();
        assert!(text.contains("Challenges\n• WebRTC connection stability\n• Scalable signaling server\n"));
        assert!(text.contains("Next Steps\n• Add recording feature"));
    }
}
