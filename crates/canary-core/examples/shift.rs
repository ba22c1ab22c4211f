use canary_api::labels::parse_selector;
use canary_core::{
    validate_destination_rule_list, DestinationRuleManager, IstioRouteList, MemoryStore, Shift,
    Traffic,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = MemoryStore::new();
    let selector = parse_selector("app=api-testing,environment=test").unwrap();

    // roll out two builds of the same service
    for build in [41, 42] {
        let manager = DestinationRuleManager::new(
            format!("rollout-{build}"),
            "api-testing",
            "arrow",
            build,
            store.clone(),
        );

        let shift = Shift {
            port: 8080,
            hostname: "api-testing.arrow.svc.cluster.local".to_string(),
            selector: selector.clone(),
            traffic: Traffic {
                pod_selector: parse_selector(&format!("version={build}")).unwrap(),
            },
        };

        let shifted = manager.apply(&shift).await.unwrap();
        println!(
            "build={build} subset={} rule={}",
            shifted.subset.name,
            serde_json::to_string(&shifted.destination_rule).unwrap(),
        );
    }

    // retire the old build
    let old = DestinationRuleManager::new("rollout-41", "api-testing", "arrow", 41, store.clone());
    old.clear(&Shift {
        selector: selector.clone(),
        ..Default::default()
    })
    .await
    .unwrap();

    let routes = IstioRouteList::fetch(&store, "arrow", &selector)
        .await
        .unwrap();
    validate_destination_rule_list(&routes).unwrap();

    for rule in &routes.destination_rules {
        println!("remaining: {}", serde_json::to_string(rule).unwrap());
    }
}
