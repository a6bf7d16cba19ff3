//! Recursive entity flattening for tabular reports.
//!
//! A record is walked field by field: scalars are copied, forward single-valued
//! relations (many-to-one, one-to-one) are loaded and expanded in place, and
//! reverse or many-to-many relations are skipped. The nested result is then
//! flattened into dot-joined keys (`application.resume.description`).
//!
//! Cycles are broken with a visited set keyed by [`EntityRef`]: the root is
//! visited before the walk starts and each target is marked before it is
//! expanded, so every record is expanded at most once per walk. A relation
//! whose target was already expanded elsewhere is dropped under
//! [`Revisit::Omit`], which can make rows with shared references narrower
//! than their neighbours. [`Revisit::KeepId`] emits the target id instead.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::Connection;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::models::{
    ACCOUNTS, APPLICATION_DETAILS, APPLICATION_LINKS, APPLICATIONS, AccountRow,
    ApplicationDetailRow, ApplicationLinkRow, INTERVIEW_DETAILS, InterviewDetailRow,
    JOB_APPLICATIONS, JOB_POSTINGS, JobApplicationRow, JobPostingRow, PROFILES,
    PostingApplicationRow, ProfileRow, RESUMES, ResumeRow, SITE_LINKS, SiteLinkRow,
};
use crate::queries::{accounts, applications, postings, resumes};

/// Stable identity of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub table: &'static str,
    pub id: i64,
}

impl EntityRef {
    pub fn new(table: &'static str, id: i64) -> Self {
        Self { table, id }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Scalar(Value),
    /// Forward many-to-one / one-to-one reference; `None` for a null key.
    ForeignKey(Option<EntityRef>),
    /// Reverse, many-to-many or otherwise auto-managed relation. Never expanded.
    Related,
}

pub trait Entity {
    fn entity_ref(&self) -> EntityRef;

    /// Fields in declaration order.
    fn fields(&self) -> Vec<(&'static str, Field)>;
}

/// Resolves references to records while walking.
pub trait RecordSource {
    fn load(&self, target: &EntityRef) -> Result<Option<Box<dyn Entity>>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Value),
    Record(Nested),
}

/// Field name to value, in discovery order.
pub type Nested = Vec<(String, Node)>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Revisit {
    /// Drop the field entirely.
    #[default]
    Omit,
    /// Keep the field, holding the referenced record's id.
    KeepId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenOptions {
    pub revisit: Revisit,
    /// Relations deeper than this are emitted as ids rather than expanded.
    pub max_depth: Option<usize>,
}

impl FlattenOptions {
    pub fn report() -> Self {
        Self {
            revisit: Revisit::KeepId,
            max_depth: Some(8),
        }
    }
}

/// Expand `root` into a nested mapping, marking every expanded record in `visited`.
pub fn to_nested(
    source: &dyn RecordSource,
    root: &dyn Entity,
    visited: &mut HashSet<EntityRef>,
    options: FlattenOptions,
) -> Result<Nested> {
    visited.insert(root.entity_ref());
    walk(source, root, visited, options, 0)
}

fn walk(
    source: &dyn RecordSource,
    record: &dyn Entity,
    visited: &mut HashSet<EntityRef>,
    options: FlattenOptions,
    depth: usize,
) -> Result<Nested> {
    let mut data = Vec::new();

    for (name, field) in record.fields() {
        match field {
            Field::Related => continue,
            Field::Scalar(value) => data.push((name.to_string(), Node::Scalar(value))),
            Field::ForeignKey(None) => data.push((name.to_string(), Node::Scalar(Value::Null))),
            Field::ForeignKey(Some(target)) => {
                if visited.contains(&target) {
                    debug!(
                        "{}.{} -> {}:{} already expanded",
                        record.entity_ref().table,
                        name,
                        target.table,
                        target.id
                    );
                    if options.revisit == Revisit::KeepId {
                        data.push((name.to_string(), Node::Scalar(json!(target.id))));
                    }
                    continue;
                }
                if options.max_depth.is_some_and(|max| depth >= max) {
                    data.push((name.to_string(), Node::Scalar(json!(target.id))));
                    continue;
                }

                visited.insert(target);
                match source.load(&target)? {
                    Some(related) => {
                        let nested = walk(source, related.as_ref(), visited, options, depth + 1)?;
                        data.push((name.to_string(), Node::Record(nested)));
                    }
                    None => {
                        warn!("Dangling reference {}:{} from {}", target.table, target.id, name);
                        data.push((name.to_string(), Node::Scalar(json!(target.id))));
                    }
                }
            }
        }
    }

    Ok(data)
}

/// Collapse a nested mapping into dot-joined keys. Every value in the result is terminal.
pub fn flatten(nested: &Nested) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(nested, "", &mut out);
    out
}

fn flatten_into(nested: &Nested, prefix: &str, out: &mut Map<String, Value>) {
    for (key, node) in nested {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match node {
            Node::Scalar(value) => {
                out.insert(path, value.clone());
            }
            Node::Record(inner) => flatten_into(inner, &path, out),
        }
    }
}

/// [`to_nested`] followed by [`flatten`] with a fresh visited set.
pub fn flatten_record(
    source: &dyn RecordSource,
    root: &dyn Entity,
    options: FlattenOptions,
) -> Result<Map<String, Value>> {
    let mut visited = HashSet::new();
    let nested = to_nested(source, root, &mut visited, options)?;
    Ok(flatten(&nested))
}

// -- Entity implementations for stored rows --

fn fk(table: &'static str, id: i64) -> Field {
    Field::ForeignKey(Some(EntityRef::new(table, id)))
}

fn scalar(value: impl Into<Value>) -> Field {
    Field::Scalar(value.into())
}

fn date(value: &chrono::NaiveDate) -> Field {
    Field::Scalar(Value::String(value.format("%Y-%m-%d").to_string()))
}

impl Entity for AccountRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(ACCOUNTS, self.id)
    }

    // The password hash is deliberately absent.
    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("username", scalar(self.username.clone())),
            ("email", scalar(self.email.clone())),
            ("first_name", scalar(self.first_name.clone())),
            ("last_name", scalar(self.last_name.clone())),
            ("is_active", scalar(self.is_active)),
            ("date_joined", scalar(self.date_joined.format("%Y-%m-%d %H:%M:%S").to_string())),
            ("groups", Field::Related),
            ("profile", Field::Related),
            ("resumes", Field::Related),
        ]
    }
}

impl Entity for ProfileRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(PROFILES, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("account", fk(ACCOUNTS, self.account_id)),
            ("phone_number", scalar(self.phone_number.clone())),
            ("country", scalar(self.country.clone())),
            ("city", scalar(self.city.clone())),
            ("profile_picture", scalar(self.profile_picture.clone())),
        ]
    }
}

impl Entity for SiteLinkRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(SITE_LINKS, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("account", fk(ACCOUNTS, self.account_id)),
            ("name", scalar(self.name.clone())),
            ("url", scalar(self.url.clone())),
            ("description", scalar(self.description.clone())),
        ]
    }
}

impl Entity for ResumeRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(RESUMES, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("account", fk(ACCOUNTS, self.account_id)),
            ("description", scalar(self.description.clone())),
            ("job_title", scalar(self.job_title.clone())),
            ("file_name", scalar(self.file_name.clone())),
            ("file", scalar(self.file.clone())),
            ("summary", scalar(self.summary.clone())),
            ("category", scalar(self.category.clone())),
            ("job_app_details", Field::Related),
        ]
    }
}

impl Entity for JobApplicationRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(JOB_APPLICATIONS, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("accounts", Field::Related),
            ("job_name", scalar(self.job_name.clone())),
            ("company", scalar(self.company.clone())),
            ("country", scalar(self.country.clone())),
            ("city", scalar(self.city.clone())),
            ("apply_date", date(&self.apply_date)),
            ("valid_to", date(&self.valid_to)),
            ("portal", scalar(self.portal.clone())),
            ("link", scalar(self.link.clone())),
            ("status", scalar(self.status.clone())),
            ("details", Field::Related),
        ]
    }
}

impl Entity for ApplicationDetailRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(APPLICATION_DETAILS, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("job_application", fk(JOB_APPLICATIONS, self.job_application_id)),
            ("resumes", Field::Related),
            ("job_application_body", scalar(self.job_application_body.clone())),
            ("comments", scalar(self.comments.clone())),
            ("salary_range", scalar(self.salary_range.clone())),
        ]
    }
}

impl Entity for JobPostingRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(JOB_POSTINGS, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("company_name", scalar(self.company_name.clone())),
            ("job_position", scalar(self.job_position.clone())),
            ("work_mode", scalar(self.work_mode.clone())),
            ("work_location", scalar(self.work_location.clone())),
            ("termination_date", date(&self.termination_date)),
            ("application_links", Field::Related),
        ]
    }
}

impl Entity for PostingApplicationRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(APPLICATIONS, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("resume", fk(RESUMES, self.resume_id)),
            ("application_status", scalar(self.application_status.clone())),
            ("interviews", Field::Related),
        ]
    }
}

impl Entity for ApplicationLinkRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(APPLICATION_LINKS, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("account", fk(ACCOUNTS, self.account_id)),
            ("job_posting", fk(JOB_POSTINGS, self.job_posting_id)),
            ("application", fk(APPLICATIONS, self.application_id)),
        ]
    }
}

impl Entity for InterviewDetailRow {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(INTERVIEW_DETAILS, self.id)
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("id", scalar(self.id)),
            ("application", fk(APPLICATIONS, self.application_id)),
            ("interview_date", date(&self.interview_date)),
        ]
    }
}

fn boxed<T: Entity + 'static>(row: Option<T>) -> Option<Box<dyn Entity>> {
    row.map(|r| Box::new(r) as Box<dyn Entity>)
}

impl RecordSource for Connection {
    fn load(&self, target: &EntityRef) -> Result<Option<Box<dyn Entity>>> {
        let id = target.id;
        let record = match target.table {
            ACCOUNTS => boxed(accounts::account_by_id(self, id)?),
            PROFILES => boxed(accounts::profile_by_id(self, id)?),
            SITE_LINKS => boxed(accounts::site_link_by_id(self, id)?),
            RESUMES => boxed(resumes::resume_by_id(self, id)?),
            JOB_APPLICATIONS => boxed(applications::job_application_by_id(self, id)?),
            APPLICATION_DETAILS => boxed(applications::detail_by_id(self, id)?),
            JOB_POSTINGS => boxed(postings::posting_by_id(self, id)?),
            APPLICATIONS => boxed(postings::posting_application_by_id(self, id)?),
            APPLICATION_LINKS => boxed(postings::link_by_id(self, id)?),
            INTERVIEW_DETAILS => boxed(postings::interview_by_id(self, id)?),
            other => anyhow::bail!("No loader for table {}", other),
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory graph so cycles can be built freely.
    #[derive(Clone)]
    struct GraphNode {
        id: i64,
        name: &'static str,
        links: Vec<(&'static str, Option<i64>)>,
    }

    impl Entity for GraphNode {
        fn entity_ref(&self) -> EntityRef {
            EntityRef::new("nodes", self.id)
        }

        fn fields(&self) -> Vec<(&'static str, Field)> {
            let mut fields = vec![
                ("id", scalar(self.id)),
                ("name", scalar(self.name)),
                ("children", Field::Related),
            ];
            for (field, target) in &self.links {
                let target = target.map(|id| EntityRef::new("nodes", id));
                fields.push((*field, Field::ForeignKey(target)));
            }
            fields
        }
    }

    struct Graph(HashMap<i64, GraphNode>);

    impl Graph {
        fn new(nodes: Vec<GraphNode>) -> Self {
            Self(nodes.into_iter().map(|n| (n.id, n)).collect())
        }

        fn root(&self, id: i64) -> &GraphNode {
            &self.0[&id]
        }
    }

    impl RecordSource for Graph {
        fn load(&self, target: &EntityRef) -> Result<Option<Box<dyn Entity>>> {
            Ok(self.0.get(&target.id).cloned().map(|n| Box::new(n) as Box<dyn Entity>))
        }
    }

    fn node(id: i64, name: &'static str, links: Vec<(&'static str, Option<i64>)>) -> GraphNode {
        GraphNode { id, name, links }
    }

    #[test]
    fn nested_records_become_dotted_keys() {
        let graph = Graph::new(vec![
            node(1, "link", vec![("application", Some(2))]),
            node(2, "application", vec![("resume", Some(3))]),
            node(3, "resume", vec![]),
        ]);

        let flat = flatten_record(&graph, graph.root(1), FlattenOptions::default()).unwrap();
        let keys: Vec<_> = flat.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "name",
                "application.id",
                "application.name",
                "application.resume.id",
                "application.resume.name",
            ]
        );
        assert_eq!(flat["application.resume.name"], json!("resume"));
        assert!(!keys.iter().any(|k| k.contains("children")));
    }

    #[test]
    fn result_holds_no_mappings() {
        let graph = Graph::new(vec![
            node(1, "a", vec![("b", Some(2)), ("none", None)]),
            node(2, "b", vec![("c", Some(3))]),
            node(3, "c", vec![]),
        ]);
        let flat = flatten_record(&graph, graph.root(1), FlattenOptions::default()).unwrap();
        assert!(flat.values().all(|v| !v.is_object()));
        assert_eq!(flat["none"], Value::Null);
    }

    #[test]
    fn cycle_terminates_without_reexpanding_root() {
        let graph = Graph::new(vec![
            node(1, "a", vec![("next", Some(2))]),
            node(2, "b", vec![("back", Some(1))]),
        ]);

        let flat = flatten_record(&graph, graph.root(1), FlattenOptions::default()).unwrap();
        assert_eq!(flat.len(), 4);
        assert!(!flat.contains_key("next.back.id"));
        assert!(!flat.contains_key("next.back"));
    }

    #[test]
    fn self_reference_is_dropped() {
        let graph = Graph::new(vec![node(1, "a", vec![("me", Some(1))])]);
        let flat = flatten_record(&graph, graph.root(1), FlattenOptions::default()).unwrap();
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn second_sibling_to_same_record_is_omitted() {
        let graph = Graph::new(vec![
            node(1, "root", vec![("owner", Some(9)), ("reviewer", Some(9))]),
            node(9, "shared", vec![]),
        ]);

        let flat = flatten_record(&graph, graph.root(1), FlattenOptions::default()).unwrap();
        assert_eq!(flat["owner.name"], json!("shared"));
        assert!(!flat.keys().any(|k| k.starts_with("reviewer")));
    }

    #[test]
    fn keep_id_preserves_row_width() {
        let graph = Graph::new(vec![
            node(1, "root", vec![("owner", Some(9)), ("reviewer", Some(9))]),
            node(9, "shared", vec![]),
        ]);

        let options = FlattenOptions { revisit: Revisit::KeepId, max_depth: None };
        let flat = flatten_record(&graph, graph.root(1), options).unwrap();
        assert_eq!(flat["reviewer"], json!(9));
    }

    #[test]
    fn depth_limit_stops_expansion() {
        let graph = Graph::new(vec![
            node(1, "a", vec![("b", Some(2))]),
            node(2, "b", vec![("c", Some(3))]),
            node(3, "c", vec![]),
        ]);

        let options = FlattenOptions { revisit: Revisit::Omit, max_depth: Some(1) };
        let flat = flatten_record(&graph, graph.root(1), options).unwrap();
        assert_eq!(flat["b.name"], json!("b"));
        assert_eq!(flat["b.c"], json!(3));
    }

    #[test]
    fn shared_visited_set_spans_calls() {
        let graph = Graph::new(vec![
            node(1, "a", vec![("shared", Some(3))]),
            node(2, "b", vec![("shared", Some(3))]),
            node(3, "c", vec![]),
        ]);

        let mut visited = HashSet::new();
        let options = FlattenOptions::default();
        let first = to_nested(&graph, graph.root(1), &mut visited, options).unwrap();
        let second = to_nested(&graph, graph.root(2), &mut visited, options).unwrap();
        assert_eq!(flatten(&first).len(), 4);
        assert_eq!(flatten(&second).len(), 2);
        assert!(visited.contains(&EntityRef::new("nodes", 3)));
    }

    fn seeded_link(db: &crate::Database) -> ApplicationLinkRow {
        use crate::queries::fixtures;
        use crate::queries::postings::{
            NewJobPosting, insert_application_link, insert_posting, insert_posting_application,
            link_by_id,
        };
        use crate::queries::resumes::{NewResume, insert_resume};
        use chrono::NaiveDate;
        use jobtrack_types::models::{PostingApplicationStatus, WorkMode};

        db.with_conn(|conn| {
            let jan = fixtures::account(conn, "jan");
            let resume = insert_resume(
                conn,
                &NewResume {
                    account_id: jan,
                    description: "cv.pdf".into(),
                    category: "Engineering".into(),
                    ..Default::default()
                },
            )?;
            let posting = insert_posting(
                conn,
                &NewJobPosting {
                    company_name: "Acme".into(),
                    job_position: "Engineer".into(),
                    work_mode: WorkMode::Hybrid,
                    work_location: "Gdańsk".into(),
                    termination_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                },
            )?;
            let application =
                insert_posting_application(conn, resume, PostingApplicationStatus::Pending)?;
            let link = insert_application_link(conn, jan, posting, application)?;
            Ok(link_by_id(conn, link)?.unwrap())
        })
        .unwrap()
    }

    #[test]
    fn link_report_drops_account_already_expanded() {
        let db = crate::Database::open_in_memory().unwrap();
        let link = seeded_link(&db);

        let flat = db
            .with_conn(|conn| flatten_record(conn, &link, FlattenOptions::default()))
            .unwrap();

        assert_eq!(flat["account.username"], json!("jan"));
        assert_eq!(flat["job_posting.company_name"], json!("Acme"));
        assert_eq!(flat["application.resume.description"], json!("cv.pdf"));
        assert!(!flat.keys().any(|k| k.starts_with("application.resume.account")));
        assert!(!flat.keys().any(|k| k.contains("password")));
        assert!(flat.values().all(|v| !v.is_object()));
    }

    #[test]
    fn link_report_keeps_id_for_shared_account() {
        let db = crate::Database::open_in_memory().unwrap();
        let link = seeded_link(&db);

        let flat = db
            .with_conn(|conn| flatten_record(conn, &link, FlattenOptions::report()))
            .unwrap();
        assert_eq!(flat["application.resume.account"], json!(link.account_id));
    }
}
