use std::collections::BTreeMap;
use std::path::Path;

use kubephase_domain::{ManifestPath, PhaseKey, PhasePlan};

/// Derive the phase key from a manifest's file name.
///
/// A name qualifies when its first two bytes are decimal digits and the third is
/// a dash (`00-namespace.yaml` has key `00`). Anything else has no key and runs
/// in the catch-all phase.
#[must_use]
pub fn extract_phase_key(path: &Path) -> Option<PhaseKey> {
    let name = path.file_name()?.as_encoded_bytes();
    match name {
        [first, second, b'-', ..] if first.is_ascii_digit() && second.is_ascii_digit() => {
            let key = [char::from(*first), char::from(*second)];
            PhaseKey::new(key.iter().collect()).ok()
        }
        _ => None,
    }
}

/// Group manifests into ordered phases.
///
/// Manifests sharing a key keep their relative input order. The catch-all phase
/// is always present and always last.
#[must_use]
pub fn partition<I>(manifests: I) -> PhasePlan
where
    I: IntoIterator<Item = ManifestPath>,
{
    let mut keyed: BTreeMap<PhaseKey, Vec<ManifestPath>> = BTreeMap::new();
    let mut catch_all = Vec::new();

    for manifest in manifests {
        match extract_phase_key(manifest.as_path()) {
            Some(key) => keyed.entry(key).or_default().push(manifest),
            None => catch_all.push(manifest),
        }
    }

    PhasePlan::new(keyed.into_iter().collect(), catch_all)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::path::{Path, PathBuf};

    use kubephase_domain::ManifestPath;

    use super::{extract_phase_key, partition};

    fn manifests(paths: &[&str]) -> Vec<ManifestPath> {
        paths
            .iter()
            .map(|path| ManifestPath::try_from(PathBuf::from(path)).expect("manifest"))
            .collect()
    }

    fn names(plan: &kubephase_domain::PhasePlan) -> Vec<Vec<String>> {
        plan.iter()
            .map(|phase| {
                phase
                    .manifests
                    .iter()
                    .map(|manifest| manifest.as_path().display().to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn key_requires_digit_digit_dash() {
        let key = |name: &str| extract_phase_key(Path::new(name)).map(|key| key.to_string());
        assert_eq!(key("00-ns.yaml").as_deref(), Some("00"));
        assert_eq!(key("deploy/99-x.yaml").as_deref(), Some("99"));
        assert_eq!(key("1-y.yaml"), None);
        assert_eq!(key("ab-x.yaml"), None);
        assert_eq!(key("123-x.yaml"), None);
        assert_eq!(key("12_x.yaml"), None);
        assert_eq!(key("12"), None);
        assert_eq!(key("1"), None);
        assert_eq!(key("12-"), Some("12".to_string()));
    }

    #[test]
    fn key_uses_only_the_base_name() {
        assert_eq!(extract_phase_key(Path::new("00-dir/readme.yaml")), None);
    }

    #[test]
    fn keyed_phases_then_catch_all() {
        let plan = partition(manifests(&["10-deploy.yaml", "readme.yaml", "00-ns.yaml"]));
        assert_eq!(
            names(&plan),
            vec![
                vec!["00-ns.yaml".to_string()],
                vec!["10-deploy.yaml".to_string()],
                vec!["readme.yaml".to_string()],
            ]
        );
    }

    #[test]
    fn non_matching_names_share_the_catch_all_in_input_order() {
        let plan = partition(manifests(&["ab-x.yaml", "1-y.yaml"]));
        assert_eq!(plan.phases().len(), 1);
        assert!(plan.phases()[0].is_catch_all());
        assert_eq!(
            names(&plan),
            vec![vec!["ab-x.yaml".to_string(), "1-y.yaml".to_string()]]
        );
    }

    #[test]
    fn same_key_preserves_discovery_order() {
        let plan = partition(manifests(&["b/05-z.yaml", "a/05-a.yaml", "05-m.yaml"]));
        assert_eq!(
            names(&plan)[0],
            vec![
                "b/05-z.yaml".to_string(),
                "a/05-a.yaml".to_string(),
                "05-m.yaml".to_string()
            ]
        );
    }

    #[test]
    fn empty_input_yields_one_empty_catch_all() {
        let plan = partition(Vec::new());
        assert_eq!(plan.phases().len(), 1);
        assert!(plan.phases()[0].is_catch_all());
        assert!(plan.phases()[0].manifests.is_empty());
    }

    #[test]
    fn catch_all_is_present_when_every_file_is_keyed() {
        let plan = partition(manifests(&["20-b.yaml", "03-a.yaml"]));
        let labels: Vec<String> = plan.iter().map(kubephase_domain::Phase::label).collect();
        assert_eq!(labels, vec!["03", "20", "catch-all"]);
    }
}
