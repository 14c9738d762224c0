//! The dataset one fixture batch is generated from.
//!
//! Every entity file holds one JSON object per line. Ids are remapped to
//! the ids the server generated when the data was loaded, through the
//! `generatedIds` tables.
use crate::error::{Error, Result};
use crate::Visibility;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub userid: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_account_privacy: Visibility,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoleMembers {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Roles of a group, content item or discussion. Content calls its
/// non-managing role `viewer`; it is read into `member`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Roles {
    #[serde(default)]
    pub manager: RoleMembers,
    #[serde(default, alias = "viewer")]
    pub member: RoleMembers,
}

impl Roles {
    /// Managers and members, each once.
    pub fn users(&self) -> BTreeSet<&str> {
        self.manager
            .users
            .iter()
            .chain(&self.member.users)
            .map(String::as_str)
            .collect()
    }

    pub fn groups(&self) -> BTreeSet<&str> {
        self.manager
            .groups
            .iter()
            .chain(&self.member.groups)
            .map(String::as_str)
            .collect()
    }

    pub fn has_user(&self, id: &str) -> bool {
        self.manager.users.iter().any(|u| u == id) || self.member.users.iter().any(|u| u == id)
    }

    /// Whether `id` manages without also holding the other role.
    pub fn is_manager_only(&self, id: &str) -> bool {
        self.manager.users.iter().any(|u| u == id) && !self.member.users.iter().any(|u| u == id)
    }
}

/// A group, content item or discussion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub roles: Roles,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedId {
    id: String,
    generated_id: String,
}

/// Dataset id to generated id, per entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMapping {
    pub users: BTreeMap<String, String>,
    pub groups: BTreeMap<String, String>,
    pub content: BTreeMap<String, String>,
    pub discussions: BTreeMap<String, String>,
}

impl IdMapping {
    // An unmapped id yields an empty column, which the CSV writer rejects.
    pub fn user(&self, id: &str) -> &str {
        lookup(&self.users, id)
    }

    pub fn group(&self, id: &str) -> &str {
        lookup(&self.groups, id)
    }

    pub fn content(&self, id: &str) -> &str {
        lookup(&self.content, id)
    }

    pub fn discussion(&self, id: &str) -> &str {
        lookup(&self.discussions, id)
    }
}

fn lookup<'a>(map: &'a BTreeMap<String, String>, id: &str) -> &'a str {
    map.get(id).map(String::as_str).unwrap_or("")
}

/// One loaded batch. All maps are keyed and iterated by dataset id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub batch: u32,
    pub users: BTreeMap<String, User>,
    pub groups: BTreeMap<String, Resource>,
    pub content: BTreeMap<String, Resource>,
    pub discussions: BTreeMap<String, Resource>,
    pub id_mapping: IdMapping,
}

impl Model {
    pub fn load<P: AsRef<Path>>(source_dir: P, batch: u32) -> Result<Model> {
        let dir = source_dir.as_ref();
        let entity_file = |kind: &str| dir.join(kind).join(format!("{}.txt", batch));
        let mapping_file =
            |kind: &str| dir.join("generatedIds").join(format!("{}-{}.txt", kind, batch));

        let users: Vec<User> = read_lines(&entity_file("users"))?;
        let groups: Vec<Resource> = read_lines(&entity_file("groups"))?;
        let content: Vec<Resource> = read_lines(&entity_file("content"))?;
        let discussions: Vec<Resource> = read_lines(&entity_file("discussions"))?;

        let id_mapping = IdMapping {
            users: read_mapping(&mapping_file("users"))?,
            groups: read_mapping(&mapping_file("groups"))?,
            content: read_mapping(&mapping_file("content"))?,
            discussions: read_mapping(&mapping_file("discussions"))?,
        };

        let model = Model {
            batch,
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            groups: by_id(groups),
            content: by_id(content),
            discussions: by_id(discussions),
            id_mapping,
        };
        info!(
            batch,
            users = model.users.len(),
            groups = model.groups.len(),
            content = model.content.len(),
            discussions = model.discussions.len(),
            "loaded dataset"
        );
        Ok(model)
    }

    /// Every role entry naming a user or group the batch does not contain.
    pub fn dangling_references(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        let kinds = [
            ("group", &self.groups),
            ("content", &self.content),
            ("discussion", &self.discussions),
        ];
        for (kind, resources) in kinds.iter() {
            for resource in resources.values() {
                for user in resource.roles.users() {
                    if !self.users.contains_key(user) {
                        errors.push(Error::MalformedDataset {
                            entity: format!("{} {}", kind, resource.id),
                            reference: format!("user {}", user),
                        });
                    }
                }
                for group in resource.roles.groups() {
                    if !self.groups.contains_key(group) {
                        errors.push(Error::MalformedDataset {
                            entity: format!("{} {}", kind, resource.id),
                            reference: format!("group {}", group),
                        });
                    }
                }
            }
        }
        errors
    }
}

fn by_id(resources: Vec<Resource>) -> BTreeMap<String, Resource> {
    resources.into_iter().map(|r| (r.id.clone(), r)).collect()
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    debug!(file = %path.display(), "reading file");
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut items = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(line).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

fn read_mapping(path: &Path) -> Result<BTreeMap<String, String>> {
    let entries: Vec<GeneratedId> = read_lines(path)?;
    Ok(entries
        .into_iter()
        .map(|e| (e.id, e.generated_id))
        .collect())
}

/// In-memory datasets for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn user(id: &str, privacy: Visibility) -> User {
        User {
            id: id.to_owned(),
            userid: format!("login-{}", id),
            password: format!("pw-{}", id),
            display_name: None,
            username: None,
            user_account_privacy: privacy,
        }
    }

    pub fn members(users: &[&str], groups: &[&str]) -> RoleMembers {
        RoleMembers {
            users: users.iter().map(|s| s.to_string()).collect(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn resource(
        id: &str,
        visibility: Visibility,
        manager: RoleMembers,
        member: RoleMembers,
    ) -> Resource {
        Resource {
            id: id.to_owned(),
            name: None,
            description: None,
            alias: None,
            visibility,
            roles: Roles { manager, member },
        }
    }

    /// Adds `user`, mapped to `g-<id>`.
    pub fn add_user(model: &mut Model, user: User) {
        model
            .id_mapping
            .users
            .insert(user.id.clone(), format!("g-{}", user.id));
        model.users.insert(user.id.clone(), user);
    }

    pub fn add_group(model: &mut Model, group: Resource) {
        model
            .id_mapping
            .groups
            .insert(group.id.clone(), format!("g-{}", group.id));
        model.groups.insert(group.id.clone(), group);
    }

    pub fn add_content(model: &mut Model, content: Resource) {
        model
            .id_mapping
            .content
            .insert(content.id.clone(), format!("g-{}", content.id));
        model.content.insert(content.id.clone(), content);
    }

    pub fn add_discussion(model: &mut Model, discussion: Resource) {
        model
            .id_mapping
            .discussions
            .insert(discussion.id.clone(), format!("g-{}", discussion.id));
        model.discussions.insert(discussion.id.clone(), discussion);
    }

    /// Writes a one-user, one-group batch in the on-disk layout.
    pub fn write_batch(dir: &Path, batch: u32) {
        let write = |path: std::path::PathBuf, text: &str| {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        };
        write(
            dir.join("users").join(format!("{}.txt", batch)),
            concat!(
                r#"{"id":"u1","userid":"alice","password":"secret","#,
                r#""displayName":"Alice Liddell","userAccountPrivacy":"public"}"#,
                "\n\n",
            ),
        );
        write(
            dir.join("groups").join(format!("{}.txt", batch)),
            concat!(
                r#"{"id":"g1","name":"Physics","visibility":"private","roles":{"#,
                r#""manager":{"users":["u1"],"groups":[]},"#,
                r#""member":{"users":[],"groups":[]}}}"#,
                "\n",
            ),
        );
        write(
            dir.join("content").join(format!("{}.txt", batch)),
            concat!(
                r#"{"id":"c1","visibility":"public","roles":{"#,
                r#""manager":{"users":["u1"]},"#,
                r#""viewer":{"users":["u9"],"groups":["g1"]}}}"#,
                "\n",
            ),
        );
        write(dir.join("discussions").join(format!("{}.txt", batch)), "");
        for kind in &["users", "groups", "content", "discussions"] {
            let id = match *kind {
                "users" => "u1",
                "groups" => "g1",
                "content" => "c1",
                _ => "d1",
            };
            write(
                dir.join("generatedIds").join(format!("{}-{}.txt", kind, batch)),
                &format!("{{\"id\":\"{}\",\"generatedId\":\"{}-{}\"}}\n", id, kind, id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_works() {
        let dir = tempdir().unwrap();
        write_batch(dir.path(), 3);

        let model = Model::load(dir.path(), 3).unwrap();
        assert_eq!(model.batch, 3);
        let alice = &model.users["u1"];
        assert_eq!(alice.userid, "alice");
        assert_eq!(alice.display_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(alice.user_account_privacy, Visibility::Public);
        assert_eq!(model.groups["g1"].visibility, Visibility::Private);
        assert_eq!(model.content["c1"].roles.member.groups, vec!["g1".to_owned()]);
        assert!(model.discussions.is_empty());
        assert_eq!(model.id_mapping.user("u1"), "users-u1");
        assert_eq!(model.id_mapping.content("c1"), "content-c1");
        assert_eq!(model.id_mapping.group("nope"), "");
    }

    #[test]
    fn load_reports_bad_line_works() {
        let dir = tempdir().unwrap();
        write_batch(dir.path(), 0);
        fs::write(
            dir.path().join("groups").join("0.txt"),
            "{\"id\":\"g1\"}\n\n{not json}\n",
        )
        .unwrap();
        match Model::load(dir.path(), 0) {
            Err(Error::Json { path, line, .. }) => {
                assert!(path.ends_with("groups/0.txt"));
                assert_eq!(line, 3);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn load_missing_batch_works() {
        let dir = tempdir().unwrap();
        write_batch(dir.path(), 0);
        assert!(match Model::load(dir.path(), 1) {
            Err(Error::Io { .. }) => true,
            _ => false,
        });
    }

    #[test]
    fn dangling_references_works() {
        let dir = tempdir().unwrap();
        write_batch(dir.path(), 0);
        let model = Model::load(dir.path(), 0).unwrap();

        let dangling: Vec<String> = model
            .dangling_references()
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(dangling, vec!["content c1 references unknown user u9".to_owned()]);
    }

    #[test]
    fn roles_works() {
        let roles = Roles {
            manager: members(&["a", "b"], &["g2"]),
            member: members(&["b", "c"], &["g1", "g2"]),
        };
        assert_eq!(roles.users().into_iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(roles.groups().into_iter().collect::<Vec<_>>(), vec!["g1", "g2"]);
        assert!(roles.is_manager_only("a"));
        assert!(!roles.is_manager_only("b"));
        assert!(!roles.is_manager_only("c"));
        assert!(roles.has_user("c"));
    }
}
