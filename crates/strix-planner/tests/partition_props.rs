use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use strix_model::prelude::*;
use strix_planner::{Bundle, Partitioner};

fn ids(bundles: &[Bundle]) -> Vec<Vec<EntityId>> {
    bundles.iter().map(|b| b.iter().map(Entity::id).collect()).collect()
}

/// Host required, ports folded, one path per run
fn web_config() -> Configuration {
    Configuration::new("dirscan", "default", Stage::Enumeration, "{command} {host} {ports} {path}")
        .with_argument(Argument::new("host", "{host}").required().with_input(Input::new(InputTypeName::Host, 1)))
        .with_argument(
            Argument::new("ports", "{ports_commas}")
                .multiple()
                .with_input(Input::new(InputTypeName::Port, 1)),
        )
        .with_argument(Argument::new("path", "{endpoint}").with_input(Input::new(InputTypeName::Path, 1)))
}

/// Target ports folded, one wordlist and one declared vulnerability per run
fn fuzz_config() -> Configuration {
    Configuration::new("fuzzer", "default", Stage::Vulnerabilities, "{command} {target} {ports} {cve} {wordlist}")
        .with_argument(Argument::new("target", "{host}").required().with_input(Input::new(InputTypeName::Host, 1)))
        .with_argument(
            Argument::new("ports", "{ports_commas}")
                .multiple()
                .with_input(Input::new(InputTypeName::Port, 1)),
        )
        .with_argument(Argument::new("cve", "{cve}").with_input(Input::new(InputTypeName::Vulnerability, 1)))
        .with_argument(Argument::new("wordlist", "{wordlist}").with_input(Input::new(InputTypeName::Wordlist, 1)))
}

/// Host required, one port and at most one path per run
fn per_port_config() -> Configuration {
    Configuration::new("crawler", "default", Stage::Enumeration, "{command} {host} {port} {path}")
        .with_argument(Argument::new("host", "{host}").required().with_input(Input::new(InputTypeName::Host, 1)))
        .with_argument(Argument::new("port", "-p {port}").with_input(Input::new(InputTypeName::Port, 1)))
        .with_argument(Argument::new("path", "{endpoint}").with_input(Input::new(InputTypeName::Path, 1)))
}

fn host_with(ports: usize, paths: usize) -> (Vec<Entity>, Entity, Vec<Entity>, Vec<Entity>) {
    let host = Arc::new(Host::new("10.10.10.1"));
    let port_entities: Vec<Arc<Port>> = (0..ports)
        .map(|i| Arc::new(Port::new(Some(Arc::clone(&host)), 1000 + i as u16)))
        .collect();
    let path_entities: Vec<Entity> = match port_entities.first() {
        Some(first) => (0..paths)
            .map(|i| Path::new(Some(Arc::clone(first)), format!("/p{i}")).into())
            .collect(),
        None => Vec::new(),
    };
    let ports: Vec<Entity> = port_entities.into_iter().map(Entity::from).collect();
    let host: Entity = host.into();

    let mut candidates = vec![host.clone()];
    candidates.extend(ports.iter().cloned());
    candidates.extend(path_entities.iter().cloned());
    (candidates, host, ports, path_entities)
}

#[test]
fn test_target_ports_and_two_wordlists() {
    let registry = TypeRegistry::standard();
    let config = fuzz_config();
    let scope = TargetScope::new("10.10.10.1")
        .with_port(22)
        .with_port(80)
        .with_port(443)
        .with_wordlist("small", WordlistKind::Endpoint, "/wl/small")
        .with_wordlist("big", WordlistKind::Endpoint, "/wl/big");
    let seeds = scope.entities();

    let bundles = Partitioner::new(&registry, &config).partition(&seeds);

    let target = seeds[0].id();
    let ports: Vec<EntityId> = seeds[1..4].iter().map(Entity::id).collect();
    let expected: Vec<Vec<EntityId>> = [seeds[4].id(), seeds[5].id()]
        .into_iter()
        .map(|wordlist| {
            let mut bundle = vec![target];
            bundle.extend(ports.iter().copied());
            bundle.push(wordlist);
            bundle
        })
        .collect();
    assert_eq!(ids(&bundles), expected);
}

#[test]
fn test_wordlists_cross_declared_vulnerabilities() {
    let registry = TypeRegistry::standard();
    let config = fuzz_config();
    let scope = TargetScope::new("10.10.10.1")
        .with_vulnerability("CVE-2021-41773")
        .with_vulnerability("CVE-2021-42013")
        .with_wordlist("small", WordlistKind::Endpoint, "/wl/small")
        .with_wordlist("big", WordlistKind::Endpoint, "/wl/big")
        .with_wordlist("huge", WordlistKind::Endpoint, "/wl/huge");
    let seeds = scope.entities();
    let target = seeds[0].id();
    let (v1, v2) = (seeds[1].id(), seeds[2].id());
    let wordlists: Vec<EntityId> = seeds[3..].iter().map(Entity::id).collect();

    let bundles = Partitioner::new(&registry, &config).partition(&seeds);

    // vulnerabilities are processed before wordlists and vary slowest
    let expected: Vec<Vec<EntityId>> = [v1, v2]
        .into_iter()
        .flat_map(|v| wordlists.iter().map(move |w| vec![target, v, *w]))
        .collect();
    assert_eq!(ids(&bundles), expected);
}

proptest! {
    #[test]
    fn prop_partition_is_deterministic(ports in 0usize..5, paths in 0usize..5) {
        let registry = TypeRegistry::standard();
        let config = web_config();
        let (candidates, ..) = host_with(ports, paths);
        let partitioner = Partitioner::new(&registry, &config);
        prop_assert_eq!(partitioner.partition(&candidates), partitioner.partition(&candidates));
    }

    #[test]
    fn prop_multiple_rides_along_single_branches(ports in 1usize..6, paths in 0usize..6) {
        let registry = TypeRegistry::standard();
        let config = web_config();
        let (candidates, host, port_entities, path_entities) = host_with(ports, paths);

        let bundles = Partitioner::new(&registry, &config).partition(&candidates);

        prop_assert_eq!(bundles.len(), paths.max(1));
        for (i, bundle) in bundles.iter().enumerate() {
            prop_assert_eq!(&bundle[0], &host);
            prop_assert_eq!(&bundle[1..=ports], &port_entities[..]);
            if paths > 0 {
                prop_assert_eq!(bundle.len(), ports + 2);
                prop_assert_eq!(&bundle[ports + 1], &path_entities[i]);
            } else {
                prop_assert_eq!(bundle.len(), ports + 1);
            }
        }
    }

    #[test]
    fn prop_independent_dimensions_cross(vulns in 1usize..5, wordlists in 1usize..5) {
        let registry = TypeRegistry::standard();
        let config = fuzz_config();
        let mut scope = TargetScope::new("10.10.10.1");
        for i in 0..vulns {
            scope = scope.with_vulnerability(format!("CVE-2024-{i:04}"));
        }
        for i in 0..wordlists {
            scope = scope.with_wordlist(format!("w{i}"), WordlistKind::Endpoint, format!("/wl/{i}"));
        }

        let bundles = Partitioner::new(&registry, &config).partition(&scope.entities());

        prop_assert_eq!(bundles.len(), vulns * wordlists);
        let mut combos: Vec<(EntityId, EntityId)> = bundles.iter().map(|b| (b[1].id(), b[2].id())).collect();
        combos.sort();
        combos.dedup();
        prop_assert_eq!(combos.len(), vulns * wordlists);
    }

    #[test]
    fn prop_paths_stay_with_their_port(owners in proptest::collection::vec(0usize..4, 0..8), ports in 1usize..5) {
        let registry = TypeRegistry::standard();
        let config = per_port_config();
        let host = Arc::new(Host::new("10.10.10.1"));
        let port_entities: Vec<Arc<Port>> = (0..ports)
            .map(|i| Arc::new(Port::new(Some(Arc::clone(&host)), 8000 + i as u16)))
            .collect();
        let paths: Vec<Arc<Path>> = owners
            .iter()
            .enumerate()
            .map(|(i, owner)| Arc::new(Path::new(Some(Arc::clone(&port_entities[owner % ports])), format!("/p{i}"))))
            .collect();
        let mut candidates: Vec<Entity> = vec![host.clone().into()];
        candidates.extend(port_entities.iter().cloned().map(Entity::from));
        candidates.extend(paths.iter().cloned().map(Entity::from));

        let bundles = Partitioner::new(&registry, &config).partition(&candidates);

        for bundle in &bundles {
            prop_assert_eq!(bundle.iter().filter(|e| e.kind() == EntityKind::Port).count(), 1);
            prop_assert!(bundle.iter().filter(|e| e.kind() == EntityKind::Path).count() <= 1);
        }
        for path in &paths {
            let owner = path.port.as_ref().map(|p| p.id);
            let holding: Vec<&Bundle> = bundles.iter().filter(|b| b.iter().any(|e| e.id() == path.id)).collect();
            prop_assert_eq!(holding.len(), 1);
            prop_assert!(holding[0].iter().any(|e| Some(e.id()) == owner));
        }
        // a port without paths still gets its own run
        for port in &port_entities {
            prop_assert!(bundles.iter().any(|b| b.iter().any(|e| e.id() == port.id)));
        }
    }
}
