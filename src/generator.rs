use crate::access::{private_access_rows, PrivateResource, MAX_DEPTH};
use crate::csv_writer::{CsvWriter, WriteSummary};
use crate::dataset::{Model, Resource};
use crate::error::Result;
use crate::Visibility;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

pub type Row = Vec<String>;

pub const PUBLIC_IDS_PER_ROW: usize = 10;
pub const NON_VIEWERS_PER_CONTENT: usize = 5;
pub const NON_MEMBERS_PER_GROUP: usize = 3;
pub const SEARCH_TERM_MIN_LENGTH: usize = 3;
pub const SEARCH_TERM_MIN_COUNT: usize = 30;

/// One fixture file and the rule its rows follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    Users,
    PublicUsers,
    PublicGroups,
    PublicContent,
    PublicDiscussions,
    EditGroups,
    ManageResources,
    ContentAddUsers,
    GroupAddUsers,
    SearchTerms,
    UsersPrivateContentAccess,
    UsersPrivateGroupsAccess,
}

impl Generator {
    pub const ALL: [Generator; 12] = [
        Generator::Users,
        Generator::PublicUsers,
        Generator::PublicGroups,
        Generator::PublicContent,
        Generator::PublicDiscussions,
        Generator::EditGroups,
        Generator::ManageResources,
        Generator::ContentAddUsers,
        Generator::GroupAddUsers,
        Generator::SearchTerms,
        Generator::UsersPrivateContentAccess,
        Generator::UsersPrivateGroupsAccess,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Generator::Users => "users",
            Generator::PublicUsers => "public_users",
            Generator::PublicGroups => "public_groups",
            Generator::PublicContent => "public_content",
            Generator::PublicDiscussions => "public_discussions",
            Generator::EditGroups => "edit_groups",
            Generator::ManageResources => "manage_resources",
            Generator::ContentAddUsers => "content_add_users",
            Generator::GroupAddUsers => "group_add_users",
            Generator::SearchTerms => "search_terms_30",
            Generator::UsersPrivateContentAccess => "users_private_content_access",
            Generator::UsersPrivateGroupsAccess => "users_private_groups_access",
        }
    }

    pub fn rows(self, model: &Model) -> Vec<Row> {
        let ids = &model.id_mapping;
        match self {
            Generator::Users => users(model),
            Generator::PublicUsers => public_chunks(
                model
                    .users
                    .values()
                    .filter(|u| u.user_account_privacy == Visibility::Public)
                    .map(|u| ids.user(&u.id)),
            ),
            Generator::PublicGroups => {
                public_chunks(public(&model.groups).map(|r| ids.group(&r.id)))
            }
            Generator::PublicContent => {
                public_chunks(public(&model.content).map(|r| ids.content(&r.id)))
            }
            Generator::PublicDiscussions => {
                public_chunks(public(&model.discussions).map(|r| ids.discussion(&r.id)))
            }
            Generator::EditGroups => edit_groups(model),
            Generator::ManageResources => manage_resources(model),
            Generator::ContentAddUsers => {
                add_users(model, &model.content, &ids.content, NON_VIEWERS_PER_CONTENT)
            }
            Generator::GroupAddUsers => {
                add_users(model, &model.groups, &ids.groups, NON_MEMBERS_PER_GROUP)
            }
            Generator::SearchTerms => search_terms(model),
            Generator::UsersPrivateContentAccess => {
                private_access_rows(model, PrivateResource::Content, MAX_DEPTH)
            }
            Generator::UsersPrivateGroupsAccess => {
                private_access_rows(model, PrivateResource::Groups, MAX_DEPTH)
            }
        }
    }

    pub fn generate(self, model: &Model, writer: &CsvWriter) -> Result<WriteSummary> {
        writer.write(self.file_name(), &self.rows(model))
    }
}

fn users(model: &Model) -> Vec<Row> {
    model
        .users
        .values()
        .map(|u| {
            vec![
                model.id_mapping.user(&u.id).to_owned(),
                u.userid.clone(),
                u.password.clone(),
            ]
        })
        .collect()
}

fn public(resources: &BTreeMap<String, Resource>) -> impl Iterator<Item = &Resource> {
    resources
        .values()
        .filter(|r| r.visibility == Visibility::Public)
}

/// Rows of ten ids; a trailing partial row is dropped.
fn public_chunks<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<Row> {
    let ids: Vec<String> = ids.map(str::to_owned).collect();
    ids.chunks_exact(PUBLIC_IDS_PER_ROW)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// `[group, manager, manager password, member, non-member]`: the manager
/// can remove the member and add the non-member.
fn edit_groups(model: &Model) -> Vec<Row> {
    let mut rng = StdRng::seed_from_u64(u64::from(model.batch));
    let ids = &model.id_mapping;
    let mut rows = Vec::new();
    for group in model.groups.values() {
        let roles = &group.roles;
        let (manager, member) = match (roles.manager.users.first(), roles.member.users.first()) {
            (Some(manager), Some(member)) => (manager, member),
            _ => continue,
        };
        let password = match model.users.get(manager) {
            Some(user) => &user.password,
            None => continue,
        };
        let outsiders: Vec<&str> = model
            .users
            .keys()
            .map(String::as_str)
            .filter(|u| !roles.has_user(u))
            .collect();
        if let Some(outsider) = outsiders.choose(&mut rng) {
            rows.push(vec![
                ids.group(&group.id).to_owned(),
                ids.user(manager).to_owned(),
                password.clone(),
                ids.user(member).to_owned(),
                ids.user(outsider).to_owned(),
            ]);
        }
    }
    rows
}

#[derive(Default)]
struct Managed<'a> {
    groups: Vec<&'a str>,
    content: Vec<&'a str>,
    discussions: Vec<&'a str>,
}

/// `[login, password, group, content, discussion]` for users managing at
/// least one of each, cycling through what they manage.
fn manage_resources(model: &Model) -> Vec<Row> {
    let ids = &model.id_mapping;
    let mut managed: BTreeMap<&str, Managed> = BTreeMap::new();
    for group in model.groups.values() {
        for user in &group.roles.manager.users {
            if group.roles.is_manager_only(user) {
                managed
                    .entry(user.as_str())
                    .or_default()
                    .groups
                    .push(ids.group(&group.id));
            }
        }
    }
    for content in model.content.values() {
        for user in &content.roles.manager.users {
            if content.roles.is_manager_only(user) {
                managed
                    .entry(user.as_str())
                    .or_default()
                    .content
                    .push(ids.content(&content.id));
            }
        }
    }
    for discussion in model.discussions.values() {
        for user in &discussion.roles.manager.users {
            if discussion.roles.is_manager_only(user) {
                managed
                    .entry(user.as_str())
                    .or_default()
                    .discussions
                    .push(ids.discussion(&discussion.id));
            }
        }
    }

    let mut rows = Vec::new();
    for (user_id, m) in managed {
        let user = match model.users.get(user_id) {
            Some(user) => user,
            None => continue,
        };
        if m.groups.is_empty() || m.content.is_empty() || m.discussions.is_empty() {
            continue;
        }
        let count = m.groups.len().max(m.content.len()).max(m.discussions.len());
        for i in 0..count {
            rows.push(vec![
                user.userid.clone(),
                user.password.clone(),
                m.groups[i % m.groups.len()].to_owned(),
                m.content[i % m.content.len()].to_owned(),
                m.discussions[i % m.discussions.len()].to_owned(),
            ]);
        }
    }
    rows
}

/// `[login, password, resource, outsider..]`: a manager of the resource
/// and `per_resource` users holding no role on it. Outsiders are taken
/// round-robin over all users, continuing across resources.
fn add_users(
    model: &Model,
    resources: &BTreeMap<String, Resource>,
    resource_ids: &BTreeMap<String, String>,
    per_resource: usize,
) -> Vec<Row> {
    let users: Vec<&str> = model.users.keys().map(String::as_str).collect();
    let mut cursor = 0;
    let mut rows = Vec::new();
    for resource in resources.values() {
        let roles = &resource.roles;
        let manager = roles
            .manager
            .users
            .iter()
            .rev()
            .find(|u| roles.is_manager_only(u))
            .and_then(|u| model.users.get(u));
        let manager = match manager {
            Some(manager) => manager,
            None => continue,
        };

        let mut outsiders = Vec::with_capacity(per_resource);
        for _ in 0..users.len() {
            if outsiders.len() == per_resource {
                break;
            }
            let candidate = users[cursor % users.len()];
            cursor += 1;
            if !roles.has_user(candidate) {
                outsiders.push(model.id_mapping.user(candidate).to_owned());
            }
        }
        if outsiders.len() < per_resource {
            continue;
        }

        let mut row = vec![
            manager.userid.clone(),
            manager.password.clone(),
            resource_ids.get(&resource.id).cloned().unwrap_or_default(),
        ];
        row.extend(outsiders);
        rows.push(row);
    }
    rows
}

/// Words of names and descriptions frequent enough to fill three pages of
/// search results.
fn search_terms(model: &Model) -> Vec<Row> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for content in model.content.values() {
        count_terms(&mut counts, &content.description);
        count_terms(&mut counts, &content.name);
    }
    for group in model.groups.values() {
        count_terms(&mut counts, &group.name);
        count_terms(&mut counts, &group.description);
        count_terms(&mut counts, &group.alias);
    }
    for user in model.users.values() {
        count_terms(&mut counts, &user.display_name);
        count_terms(&mut counts, &user.username);
    }

    counts
        .into_iter()
        .filter(|(term, n)| {
            term.chars().count() >= SEARCH_TERM_MIN_LENGTH && *n >= SEARCH_TERM_MIN_COUNT
        })
        .map(|(term, _)| vec![term.to_owned()])
        .collect()
}

fn count_terms<'a>(counts: &mut BTreeMap<&'a str, usize>, text: &'a Option<String>) {
    if let Some(text) = text {
        for term in text.split(' ') {
            *counts.entry(term).or_insert(0) += 1;
        }
    }
}
