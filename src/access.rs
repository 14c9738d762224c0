//! Which users reach a private resource, directly or through nested
//! group roles, and at which depth.
//!
//! Depth 0 holds the users holding a role on the resource itself. Depth
//! `d + 1` holds the direct users of the groups assigned to the groups
//! explored at depth `d`. Every group is explored at most once per
//! traversal, so cyclic group graphs terminate, and a user is only listed
//! at the shallowest depth it is reached.
use crate::dataset::{Model, Resource, Roles};
use crate::Visibility;
use std::collections::{BTreeMap, BTreeSet};

pub const MAX_DEPTH: usize = 3;
/// A user qualifies only with at least this many resources at every depth.
pub const MIN_RESOURCES_PER_DEPTH: usize = 1;
pub const MAX_ROWS_PER_USER: usize = 10;

/// Users reaching one resource, indexed by depth `0..=max_depth`.
pub type DepthSets = Vec<BTreeSet<String>>;

/// Breadth-first traversal from a resource holding `roles`. `root_group`
/// is the resource's own id when it is a group.
pub fn access_depths(
    roles: &Roles,
    root_group: Option<&str>,
    groups: &BTreeMap<String, Resource>,
    max_depth: usize,
) -> DepthSets {
    let mut visited: BTreeSet<&str> = root_group.into_iter().collect();
    let mut reached: BTreeSet<&str> = BTreeSet::new();
    let mut depths = Vec::with_capacity(max_depth + 1);

    let mut users = roles.users();
    let mut frontier = roles.groups();
    for _ in 0..=max_depth {
        users.retain(|u| !reached.contains(u));
        reached.extend(users.iter().copied());
        depths.push(users.iter().map(|u| u.to_string()).collect());

        frontier.retain(|g| !visited.contains(g));
        visited.extend(frontier.iter().copied());

        let mut next_users = BTreeSet::new();
        let mut next_frontier = BTreeSet::new();
        for id in &frontier {
            if let Some(group) = groups.get(*id) {
                next_users.extend(group.roles.users());
                next_frontier.extend(group.roles.groups());
            }
        }
        users = next_users;
        frontier = next_frontier;
    }
    depths
}

/// Turns resource -> users-by-depth into user -> resources-by-depth.
pub fn invert(
    by_resource: &BTreeMap<String, DepthSets>,
    max_depth: usize,
) -> BTreeMap<String, DepthSets> {
    let mut by_user: BTreeMap<String, DepthSets> = BTreeMap::new();
    for (resource, depths) in by_resource {
        for (depth, users) in depths.iter().enumerate().take(max_depth + 1) {
            for user in users {
                by_user
                    .entry(user.clone())
                    .or_insert_with(|| vec![BTreeSet::new(); max_depth + 1])[depth]
                    .insert(resource.clone());
            }
        }
    }
    by_user
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateResource {
    Content,
    Groups,
}

/// Fixture rows `[user, login, password, resource at depth 0, ..]` for
/// every user reaching enough private resources at every depth. Each user
/// gets up to [`MAX_ROWS_PER_USER`] permutations.
pub fn private_access_rows(
    model: &Model,
    kind: PrivateResource,
    max_depth: usize,
) -> Vec<Vec<String>> {
    let (resources, is_group) = match kind {
        PrivateResource::Content => (&model.content, false),
        PrivateResource::Groups => (&model.groups, true),
    };

    let by_resource: BTreeMap<String, DepthSets> = resources
        .values()
        .filter(|r| r.visibility == Visibility::Private)
        .map(|r| {
            let root = if is_group { Some(r.id.as_str()) } else { None };
            (r.id.clone(), access_depths(&r.roles, root, &model.groups, max_depth))
        })
        .collect();

    let mut rows = Vec::new();
    for (user_id, depths) in invert(&by_resource, max_depth) {
        let user = match model.users.get(&user_id) {
            Some(user) => user,
            None => continue,
        };
        if depths.iter().any(|d| d.len() < MIN_RESOURCES_PER_DEPTH) {
            continue;
        }

        let depths: Vec<Vec<&str>> = depths
            .iter()
            .map(|d| {
                d.iter()
                    .map(|id| match kind {
                        PrivateResource::Content => model.id_mapping.content(id),
                        PrivateResource::Groups => model.id_mapping.group(id),
                    })
                    .collect()
            })
            .collect();
        let permutations = depths.iter().map(Vec::len).max().unwrap_or(0).min(MAX_ROWS_PER_USER);
        for i in 0..permutations {
            let mut row = vec![
                model.id_mapping.user(&user_id).to_owned(),
                user.userid.clone(),
                user.password.clone(),
            ];
            row.extend(depths.iter().map(|d| d[i % d.len()].to_owned()));
            rows.push(row);
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::testing::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// G: members u1 u2, manager group G2. G2: member u3, member group G3.
    /// G3: member u4, member group G (a cycle).
    fn nested_groups() -> Model {
        let mut model = Model::default();
        for id in &["u1", "u2", "u3", "u4"] {
            add_user(&mut model, user(id, Visibility::Private));
        }
        add_group(
            &mut model,
            resource("G", Visibility::Private, members(&[], &["G2"]), members(&["u1", "u2"], &[])),
        );
        add_group(
            &mut model,
            resource("G2", Visibility::Private, members(&[], &[]), members(&["u3"], &["G3"])),
        );
        add_group(
            &mut model,
            resource("G3", Visibility::Public, members(&[], &[]), members(&["u4"], &["G"])),
        );
        model
    }

    #[test]
    fn access_depths_works() {
        let model = nested_groups();
        let g = &model.groups["G"];
        let depths = access_depths(&g.roles, Some("G"), &model.groups, 1);
        assert_eq!(depths, vec![set(&["u1", "u2"]), set(&["u3"])]);

        let depths = access_depths(&g.roles, Some("G"), &model.groups, MAX_DEPTH);
        assert_eq!(
            depths,
            vec![set(&["u1", "u2"]), set(&["u3"]), set(&["u4"]), set(&[])]
        );
    }

    #[test]
    fn access_depths_keeps_shallowest_depth_works() {
        let mut model = nested_groups();
        add_group(
            &mut model,
            resource("G4", Visibility::Private, members(&["u1"], &[]), members(&[], &[])),
        );
        let roles = Roles {
            manager: members(&["u1"], &[]),
            member: members(&[], &["G4", "G2"]),
        };
        let depths = access_depths(&roles, None, &model.groups, 3);
        assert_eq!(
            depths,
            vec![set(&["u1"]), set(&["u3"]), set(&["u4"]), set(&["u2"])]
        );
    }

    #[test]
    fn access_depths_is_idempotent_works() {
        let model = nested_groups();
        let first: Vec<DepthSets> = model
            .groups
            .values()
            .map(|g| access_depths(&g.roles, Some(g.id.as_str()), &model.groups, MAX_DEPTH))
            .collect();
        let second: Vec<DepthSets> = model
            .groups
            .values()
            .map(|g| access_depths(&g.roles, Some(g.id.as_str()), &model.groups, MAX_DEPTH))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn invert_works() {
        let mut by_resource = BTreeMap::new();
        by_resource.insert("c1".to_owned(), vec![set(&["u1"]), set(&["u2"])]);
        by_resource.insert("c2".to_owned(), vec![set(&["u1", "u2"]), set(&[])]);

        let by_user = invert(&by_resource, 1);
        assert_eq!(by_user["u1"], vec![set(&["c1", "c2"]), set(&[])]);
        assert_eq!(by_user["u2"], vec![set(&["c2"]), set(&["c1"])]);
    }

    #[test]
    fn private_access_rows_works() {
        let mut model = nested_groups();
        // u3 reaches c1 directly and c2 through G2.
        add_content(
            &mut model,
            resource("c1", Visibility::Private, members(&["u3"], &[]), members(&[], &[])),
        );
        add_content(
            &mut model,
            resource("c2", Visibility::Private, members(&[], &[]), members(&["u1"], &["G2"])),
        );
        add_content(
            &mut model,
            resource("c3", Visibility::Public, members(&["u3"], &[]), members(&[], &["G2"])),
        );

        let rows = private_access_rows(&model, PrivateResource::Content, 1);
        assert_eq!(
            rows,
            vec![vec![
                "g-u3".to_owned(),
                "login-u3".to_owned(),
                "pw-u3".to_owned(),
                "g-c1".to_owned(),
                "g-c2".to_owned(),
            ]]
        );

        // Nobody reaches a private resource at depth 3.
        assert!(private_access_rows(&model, PrivateResource::Content, MAX_DEPTH).is_empty());
    }

    #[test]
    fn private_access_rows_permutes_works() {
        let mut model = Model::default();
        add_user(&mut model, user("u1", Visibility::Private));
        for id in &["g1", "g2", "g3"] {
            add_group(
                &mut model,
                resource(id, Visibility::Private, members(&["u1"], &[]), members(&[], &[])),
            );
        }
        let rows = private_access_rows(&model, PrivateResource::Groups, 0);
        let resources: Vec<&str> = rows.iter().map(|r| r[3].as_str()).collect();
        assert_eq!(resources, vec!["g-g1", "g-g2", "g-g3"]);
    }
}
