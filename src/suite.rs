use crate::error::{Error, Result};
use crate::parse::parse_suite_text;
use crate::plan::Plan;
use crate::script::Script;
use crate::Probability;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Weight of a suite entry that names none.
pub const DEFAULT_WEIGHT: u32 = 10;

/// A test case of a suite with its normalised probability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub probability: Probability,
}

/// Parses a suite file into `(name, weight)` pairs in file order.
pub fn parse_suite(text: &str) -> Result<Vec<(String, u32)>> {
    let mut seen = HashSet::new();
    let mut weights = Vec::new();
    for (name, weight) in parse_suite_text(text)? {
        if !seen.insert(name.clone()) {
            return Err(Error::configuration(
                "suite",
                format!("test case {:?} is listed twice", name),
            ));
        }
        weights.push((name, weight.unwrap_or(DEFAULT_WEIGHT)));
    }
    Ok(weights)
}

/// Turns weights into probabilities that add up to exactly 100.
///
/// Every probability is rounded down; the rounding loss goes to the first
/// test case.
pub fn normalize(weights: &[(String, u32)]) -> Result<Vec<TestCase>> {
    let total: u64 = weights.iter().map(|(_, w)| u64::from(*w)).sum();
    if total == 0 {
        return Err(Error::configuration("suite", "the weights of the test cases add up to 0"));
    }

    let mut cases: Vec<TestCase> = weights
        .iter()
        .map(|(name, weight)| TestCase {
            name: name.clone(),
            probability: (u64::from(*weight) * 100 / total) as Probability,
        })
        .collect();
    let assigned: Probability = cases.iter().map(|c| c.probability).sum();
    if let Some(first) = cases.first_mut() {
        first.probability += 100 - assigned;
    }
    Ok(cases)
}

pub fn load_suite<P: AsRef<Path>>(path: P) -> Result<Vec<TestCase>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    normalize(&parse_suite(&text)?)
}

/// Adds one session per test case, in suite order, each built from
/// `<scripts_dir>/<name>.session`.
pub fn build_suite_plan<P: AsRef<Path>>(
    plan: &mut Plan,
    cases: &[TestCase],
    scripts_dir: P,
) -> Result<()> {
    for case in cases {
        let path = scripts_dir.as_ref().join(format!("{}.session", case.name));
        let script = Script::load(&path)?;
        let session = plan.add_session(case.name.as_str(), Some(case.probability))?;
        script.apply(session)?;
        info!(
            test_case = %case.name,
            probability = case.probability,
            actions = script.actions.len(),
            "added session"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn weights(entries: &[(&str, u32)]) -> Vec<(String, u32)> {
        entries.iter().map(|(n, w)| (n.to_string(), *w)).collect()
    }

    #[test]
    fn parse_suite_defaults_weight_works() {
        let suite = "# main suite\nbrowse,20\nsearch\n\nupload,0\n";
        assert_eq!(
            parse_suite(suite).unwrap(),
            weights(&[("browse", 20), ("search", 10), ("upload", 0)])
        );
    }

    #[test]
    fn parse_suite_rejects_duplicates_works() {
        match parse_suite("browse,20\nbrowse,10\n") {
            Err(Error::Configuration { field, .. }) => assert_eq!(field, "suite"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn normalize_works() {
        let cases = normalize(&weights(&[("a", 1), ("b", 1), ("c", 1)])).unwrap();
        let probabilities: Vec<u32> = cases.iter().map(|c| c.probability).collect();
        assert_eq!(probabilities, vec![34, 33, 33]);

        let cases = normalize(&weights(&[("a", 20), ("b", 10), ("c", 0), ("d", 70)])).unwrap();
        let probabilities: Vec<u32> = cases.iter().map(|c| c.probability).collect();
        assert_eq!(probabilities, vec![20, 10, 0, 70]);
    }

    #[test]
    fn normalize_always_totals_100_works() {
        for entries in &[
            vec![("a", 7)],
            vec![("a", 3), ("b", 3), ("c", 3), ("d", 3), ("e", 3), ("f", 3), ("g", 3)],
            vec![("a", 0), ("b", 13), ("c", 29), ("d", 1)],
        ] {
            let cases = normalize(&weights(entries)).unwrap();
            assert_eq!(cases.iter().map(|c| c.probability).sum::<u32>(), 100);
        }
    }

    #[test]
    fn normalize_rejects_zero_total_works() {
        assert!(normalize(&weights(&[("a", 0), ("b", 0)])).is_err());
        assert!(normalize(&[]).is_err());
    }

    #[test]
    fn build_suite_plan_works() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("browse.session"),
            "transaction browse {\n    GET \"/api/me\";\n}\nthink 5;\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("search.session"),
            concat!(
                "transaction search {\n",
                "    GET \"/api/search\" form { \"q\": \"%%_term%%\" };\n",
                "}\n",
                "think 10;\n",
            ),
        )
        .unwrap();
        fs::write(dir.path().join("suite"), "search,1\nbrowse,2\n").unwrap();

        let cases = load_suite(dir.path().join("suite")).unwrap();
        let mut plan = Plan::default();
        build_suite_plan(&mut plan, &cases, dir.path()).unwrap();

        let sessions: Vec<(&str, u32)> = plan
            .sessions()
            .iter()
            .map(|s| (s.name(), s.probability()))
            .collect();
        assert_eq!(sessions, vec![("search", 34), ("browse", 66)]);
    }

    #[test]
    fn build_suite_plan_missing_script_works() {
        let dir = tempdir().unwrap();
        let cases = vec![TestCase {
            name: "missing".to_owned(),
            probability: 100,
        }];
        let mut plan = Plan::default();
        match build_suite_plan(&mut plan, &cases, dir.path()) {
            Err(Error::Io { path, .. }) => assert!(path.ends_with("missing.session")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
