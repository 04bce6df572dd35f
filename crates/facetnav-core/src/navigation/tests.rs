use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::*;
use crate::config::{Clock, EngineConfig};
use crate::doc_path::DocPath;
use crate::models::{Document, NodeKind, PropertyValue, VirtualNode};
use crate::oracle::DocumentStore;
use crate::session::NavigationSession;

const PRICE_RANGES: &str = concat!(
    "hippo:price$[",
    "{name:'cheap', resolution:'double', end:10000},",
    "{name:'mid', resolution:'double', begin:10000, end:20000},",
    "{name:'expensive', resolution:'double', begin:20000}",
    "]"
);

fn car(name: &str, brand: &str, color: &str, price: f64) -> Document {
    Document::new(DocPath::parse(&format!("/content/cars/{name}")).expect("path"))
        .with_property("hippo:brand", PropertyValue::String(brand.to_string()))
        .with_property("hippo:color", PropertyValue::String(color.to_string()))
        .with_property("hippo:price", PropertyValue::Double(price))
}

fn store() -> Arc<DocumentStore> {
    Arc::new(
        DocumentStore::with_documents([
            car("a", "peugeot", "red", 9000.0),
            car("b", "peugeot", "blue", 15000.0),
            car("c", "bmw", "red", 25000.0),
            car("d", "bmw", "black", 30000.0),
            car("e", "audi", "red", 5000.0),
        ])
        .expect("store"),
    )
}

fn cars() -> FacetNavigationDefinition {
    FacetNavigationDefinition::new("cars", "/content/cars")
        .facet("hippo:brand", "brand")
        .facet("hippo:color", "color")
        .facet(PRICE_RANGES, "price")
}

fn root(definition: FacetNavigationDefinition) -> NavigationRoot {
    FacetNavigation::from_definition(definition)
        .expect("navigation")
        .into_root()
}

fn session(store: &Arc<DocumentStore>) -> NavigationSession {
    let at = Utc
        .with_ymd_and_hms(2026, 10, 17, 12, 0, 0)
        .single()
        .expect("date");
    NavigationSession::open(store.clone(), &EngineConfig::default(), Clock::Fixed(at))
        .expect("session")
}

fn children(node: &VirtualNode) -> Vec<(&str, u64)> {
    node.children
        .iter()
        .map(|child| (child.name.as_str(), child.count))
        .collect()
}

#[test]
fn root_lists_visible_facets_then_resultset() {
    let store = store();
    let mut session = session(&store);
    let node = session.resolve_path(&root(cars()), "").expect("root");
    assert_eq!(node.kind, NodeKind::Root);
    assert_eq!(node.name, "cars");
    assert_eq!(node.count, 5);
    assert_eq!(
        children(&node),
        vec![("brand", 5), ("color", 5), ("price", 5), ("resultset", 5)]
    );
}

#[test]
fn facet_values_are_counted_and_ordered_by_value() {
    let store = store();
    let mut session = session(&store);
    let node = session.resolve_path(&root(cars()), "brand").expect("brand");
    assert_eq!(node.kind, NodeKind::Facet);
    assert_eq!(
        children(&node),
        vec![("audi", 1), ("bmw", 2), ("peugeot", 2), ("resultset", 5)]
    );
    assert_eq!(node.value_count_sum(), node.count);
}

#[test]
fn selected_value_hides_its_own_facet() {
    let store = store();
    let mut session = session(&store);
    let node = session
        .resolve_path(&root(cars()), "brand/peugeot")
        .expect("peugeot");
    assert_eq!(node.kind, NodeKind::FacetValue);
    assert_eq!(node.count, 2);
    assert_eq!(node.child_names(), vec!["color", "price", "resultset"]);

    let colors = session
        .resolve_path(&root(cars()), "brand/peugeot/color")
        .expect("colors");
    assert_eq!(
        children(&colors),
        vec![("blue", 1), ("red", 1), ("resultset", 2)]
    );
}

#[test]
fn range_facets_keep_configured_order_and_omit_empty_buckets() {
    let store = store();
    let mut session = session(&store);
    let prices = session.resolve_path(&root(cars()), "price").expect("price");
    assert_eq!(
        children(&prices),
        vec![("cheap", 2), ("mid", 1), ("expensive", 2), ("resultset", 5)]
    );

    let red = session
        .resolve_path(&root(cars()), "color/red/price")
        .expect("red prices");
    assert_eq!(
        children(&red),
        vec![("cheap", 2), ("expensive", 1), ("resultset", 3)]
    );
}

#[test]
fn revisited_facet_yields_count_only_leafs() {
    let store = store();
    let mut session = session(&store);
    let nav = root(cars());

    let revisited = session
        .resolve_path(&nav, "brand/peugeot/brand")
        .expect("revisit");
    assert_eq!(revisited.kind, NodeKind::Facet);
    assert_eq!(children(&revisited), vec![("peugeot", 2), ("resultset", 2)]);

    let same = session
        .resolve_path(&nav, "brand/peugeot/brand/peugeot")
        .expect("same");
    assert_eq!(same.kind, NodeKind::Leaf);
    assert_eq!(same.count, 2);
    assert!(!same.has_nodes());

    let disjoint = session
        .resolve_path(&nav, "price/cheap/price/expensive")
        .expect("disjoint");
    assert_eq!(disjoint.kind, NodeKind::Leaf);
    assert_eq!(disjoint.count, 0);

    let err = session
        .resolve_path(&nav, "brand/peugeot/brand/peugeot/color")
        .expect_err("below leaf");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn resultset_lists_matching_documents_with_paging() {
    let store = store();
    let mut session = session(&store);
    let nav = root(cars());
    let node = session
        .resolve_path(&nav, "brand/bmw/resultset")
        .expect("resultset");
    assert_eq!(node.kind, NodeKind::Resultset);
    assert_eq!(node.count, 2);
    let names = node
        .result_documents
        .iter()
        .map(|doc| doc.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["c", "d"]);

    let page = session
        .resolve_with(
            &nav,
            &parse_path("resultset").expect("path"),
            ResolveOptions {
                result_offset: 1,
                result_limit: Some(2),
            },
        )
        .expect("page");
    assert_eq!(page.count, 5);
    let names = page
        .result_documents
        .iter()
        .map(|doc| doc.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
fn configured_sort_and_limit_apply_to_resultset() {
    let store = store();
    let mut session = session(&store);
    let mut definition = cars();
    definition.sort_by = vec!["hippo:price".to_string()];
    definition.sort_order = vec!["descending".to_string()];
    definition.limit = Some(2);
    let node = session
        .resolve_path(&root(definition), "resultset")
        .expect("resultset");
    let names = node
        .result_documents
        .iter()
        .map(|doc| doc.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["d", "c"]);
}

#[test]
fn unknown_or_hidden_names_are_not_found() {
    let store = store();
    let mut session = session(&store);
    let nav = root(cars());
    for path in ["nope", "brand/peugeot/resultset/x", "price/unknown", "resultset/brand"] {
        let err = session.resolve_path(&nav, path).expect_err(path);
        assert_eq!(err.code(), "NOT_FOUND", "{path}");
    }

    let guided = root(
        FacetNavigationDefinition::new("guided", "/content/cars")
            .facet("hippo:brand", "brand")
            .facet("hippo:color", "color${after:'brand'}"),
    );
    let top = session.resolve_path(&guided, "").expect("root");
    assert_eq!(top.child_names(), vec!["brand", "resultset"]);
    assert!(session.resolve_path(&guided, "color").is_err());
    let below = session.resolve_path(&guided, "brand/audi").expect("audi");
    assert_eq!(below.child_names(), vec!["color", "resultset"]);
}

#[test]
fn free_text_constrains_everything_below_it() {
    let store = store();
    let mut session = session(&store);
    let nav = root(cars());

    let node = session.resolve_path(&nav, "[{red}]").expect("red");
    assert_eq!(node.count, 3);
    let brands = session.resolve_path(&nav, "[{red}]/brand").expect("brands");
    assert_eq!(
        children(&brands),
        vec![("audi", 1), ("bmw", 1), ("peugeot", 1), ("resultset", 3)]
    );
    let suffixed = session
        .resolve_path(&nav, "brand[{red OR blue}]/peugeot")
        .expect("suffixed");
    assert_eq!(suffixed.count, 2);
    let structured = session
        .resolve_path(&nav, "[{text:'red', filter:'hippo:brand != audi'}]")
        .expect("structured");
    assert_eq!(structured.count, 2);
}

#[test]
fn malformed_free_text_degrades_to_empty_node() {
    let store = store();
    let mut session = session(&store);
    let node = session
        .resolve_path(&root(cars()), "[{*wild}]/brand")
        .expect("degraded");
    assert!(node.degraded);
    assert_eq!(node.kind, NodeKind::Facet);
    assert_eq!(node.count, 0);
    assert!(node.children.is_empty());
}

#[test]
fn unterminated_free_text_degrades_instead_of_failing() {
    let store = store();
    let mut session = session(&store);
    let nav = root(cars());

    let facet = session.resolve_path(&nav, "brand/[{foo").expect("degraded");
    assert!(facet.degraded);
    assert_eq!(facet.kind, NodeKind::Facet);
    assert_eq!(facet.count, 0);
    assert!(facet.children.is_empty());

    let top = session.resolve_path(&nav, "[{red}").expect("degraded");
    assert!(top.degraded);
    assert_eq!(top.kind, NodeKind::Root);

    let err = session
        .resolve_path(&nav, "brand]")
        .expect_err("stray bracket");
    assert_eq!(err.code(), "INVALID_PATH");
}

#[test]
fn free_text_below_a_leaf_or_resultset_is_not_found() {
    let store = store();
    let mut session = session(&store);
    let nav = root(cars());
    for path in ["brand/peugeot/brand/peugeot/[{red}]", "resultset/[{red}]"] {
        let err = session.resolve_path(&nav, path).expect_err(path);
        assert_eq!(err.code(), "NOT_FOUND", "{path}");
    }
}

#[test]
fn name_segments_are_percent_decoded() {
    assert_eq!(
        parse_path("brand/%72esultset/resultset").expect("path"),
        vec![
            PathSegment::Name("brand".to_string()),
            PathSegment::Name("resultset".to_string()),
            PathSegment::Resultset,
        ]
    );
    assert_eq!(encode_segment(" 50% off/"), "%2050%25 off%2F");
    assert_eq!(encode_segment("[x]"), "%5Bx%5D");
    assert_eq!(
        parse_path(&format!("brand/{}", encode_segment(" 50% off/"))).expect("path"),
        vec![
            PathSegment::Name("brand".to_string()),
            PathSegment::Name(" 50% off/".to_string()),
        ]
    );
    assert_eq!(
        parse_path("100%zz").expect("path"),
        vec![PathSegment::Name("100%zz".to_string())]
    );
    assert_eq!(
        PathSegment::Name("resultset".to_string()).to_string(),
        "%72esultset"
    );
}

#[test]
fn every_listed_child_resolves_through_its_segment() {
    let store = Arc::new(
        DocumentStore::with_documents([
            car("a", "resultset", "red", 1000.0),
            car("b", "rolls/royce", "red", 1000.0),
            car("c", "rolls/royce", "blue", 1000.0),
            car("d", "100%", "red", 1000.0),
            car("e", "audi", "red", 1000.0),
        ])
        .expect("store"),
    );
    let mut session = session(&store);
    let band = "hippo:price$[{name:'0/10000', resolution:'double', end:10000}]";
    let nav = root(cars().facet(band, "band"));

    let brands = session.resolve_path(&nav, "brand").expect("brands");
    let segments = brands
        .children
        .iter()
        .map(|child| child.segment.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        segments,
        vec!["100%25", "audi", "%72esultset", "rolls%2Froyce", "resultset"]
    );
    assert_eq!(brands.value_count_sum(), brands.count);
    let branch = brands.child("resultset").expect("resultset branch");
    assert!(branch.is_resultset());
    assert_eq!(branch.count, 5);
    assert_eq!(
        brands.child_by_segment("%72esultset").map(|c| c.count),
        Some(1)
    );

    let value = session
        .resolve_path(&nav, "brand/%72esultset")
        .expect("value named resultset");
    assert_eq!(value.kind, NodeKind::FacetValue);
    assert_eq!(value.count, 1);
    let listing = session
        .resolve_path(&nav, "brand/resultset")
        .expect("result branch");
    assert_eq!(listing.kind, NodeKind::Resultset);
    assert_eq!(listing.count, 5);

    for path in ["", "brand", "color", "band", "brand/rolls%2Froyce/color"] {
        let node = session.resolve_path(&nav, path).expect(path);
        for child in &node.children {
            let child_path = if path.is_empty() {
                child.segment.clone()
            } else {
                format!("{path}/{}", child.segment)
            };
            let reached = session.resolve_path(&nav, &child_path).expect(&child_path);
            assert_eq!(reached.count, child.count, "{child_path}");
            assert_eq!(reached.name, child.name, "{child_path}");
        }
    }
    let band = session.resolve_path(&nav, "band/0%2F10000").expect("band");
    assert_eq!(band.count, 5);
}

#[test]
fn multiple_docbases_navigate_their_union_only() {
    let store = Arc::new(
        DocumentStore::with_documents([
            car("a", "peugeot", "red", 9000.0),
            car("b", "bmw", "blue", 25000.0),
            Document::new(DocPath::parse("/content/vans/v").expect("path"))
                .with_property("hippo:brand", PropertyValue::String("fiat".to_string()))
                .with_property("hippo:color", PropertyValue::String("red".to_string())),
            Document::new(DocPath::parse("/content/boats/s").expect("path"))
                .with_property("hippo:brand", PropertyValue::String("fiat".to_string()))
                .with_property("hippo:color", PropertyValue::String("white".to_string())),
        ])
        .expect("store"),
    );
    let mut session = session(&store);
    let mut definition = cars();
    definition.docbases = vec!["/content/cars".to_string(), "/content/vans".to_string()];
    let nav = root(definition);

    let top = session.resolve_path(&nav, "").expect("root");
    assert_eq!(top.count, 3);
    let brands = session.resolve_path(&nav, "brand").expect("brands");
    assert_eq!(
        children(&brands),
        vec![("bmw", 1), ("fiat", 1), ("peugeot", 1), ("resultset", 3)]
    );
    let colors = session.resolve_path(&nav, "color").expect("colors");
    assert_eq!(
        children(&colors),
        vec![("blue", 1), ("red", 2), ("resultset", 3)]
    );

    let fiats = session
        .resolve_path(&nav, "brand/fiat/resultset")
        .expect("fiats");
    let paths = fiats
        .result_documents
        .iter()
        .map(|doc| doc.path.as_str())
        .collect::<Vec<_>>();
    assert_eq!(paths, vec!["/content/vans/v"]);
}

#[test]
fn navigation_filter_narrows_every_count() {
    let store = store();
    let mut session = session(&store);
    let node = session
        .resolve_path(&root(cars().filter("hippo:brand != audi")), "color")
        .expect("colors");
    assert_eq!(
        children(&node),
        vec![("black", 1), ("blue", 1), ("red", 2), ("resultset", 4)]
    );
}

#[test]
fn facet_modifiers_order_by_count_and_truncate() {
    let store = store();
    let mut session = session(&store);
    let nav = root(
        FacetNavigationDefinition::new("top", "/content/cars")
            .facet(
                "hippo:color",
                "color${sortby:'count', sortorder:'descending', limit:2}",
            ),
    );
    let node = session.resolve_path(&nav, "color").expect("color");
    assert_eq!(
        children(&node),
        vec![("red", 3), ("black", 1), ("resultset", 5)]
    );
}

#[test]
fn multi_valued_properties_count_once_per_value() {
    let store = Arc::new(
        DocumentStore::with_documents([
            Document::new(DocPath::parse("/content/cars/x").expect("path")).with_property(
                "hippo:tags",
                PropertyValue::Multi(vec![
                    PropertyValue::String("family".to_string()),
                    PropertyValue::String("diesel".to_string()),
                    PropertyValue::String("family".to_string()),
                ]),
            ),
            Document::new(DocPath::parse("/content/cars/y").expect("path")).with_property(
                "hippo:tags",
                PropertyValue::String("diesel".to_string()),
            ),
        ])
        .expect("store"),
    );
    let mut session = session(&store);
    let nav = root(
        FacetNavigationDefinition::new("tags", "/content/cars").facet("hippo:tags", "tags"),
    );
    let node = session.resolve_path(&nav, "tags").expect("tags");
    assert_eq!(
        children(&node),
        vec![("diesel", 2), ("family", 1), ("resultset", 2)]
    );
}

#[test]
fn mirror_layers_preselect_facets_and_filter_properties() {
    let store = store();
    let mut session = session(&store);
    let navigation = Arc::new(FacetNavigation::from_definition(cars()).expect("navigation"));
    let red = MirrorLayer::from_definition(
        &MirrorDefinition {
            name: "red-cars".to_string(),
            target: "cars".to_string(),
            facets: vec!["color".to_string(), "hippo:doors".to_string()],
            values: vec!["red".to_string(), "5".to_string()],
            filters: Vec::new(),
        },
        &navigation,
    )
    .expect("layer");
    assert_eq!(red.path.len(), 1);
    assert_eq!(red.filter, Constraint::equals("hippo:doors", "5"));

    let cheap = MirrorLayer::from_definition(
        &MirrorDefinition {
            name: "cheap".to_string(),
            target: "cars".to_string(),
            facets: vec!["price".to_string()],
            values: vec!["cheap".to_string()],
            filters: vec!["hippo:brand != bmw".to_string()],
        },
        &navigation,
    )
    .expect("layer");
    let mirror = NavigationRoot::new(Arc::clone(&navigation)).through(&cheap);
    let node = session.resolve_path(&mirror, "").expect("mirror root");
    assert_eq!(node.name, "cheap");
    assert_eq!(node.count, 2);
    assert_eq!(node.child_names(), vec!["brand", "color", "resultset"]);
}

#[test]
fn stacked_mirrors_equal_one_merged_layer() {
    let store = store();
    let mut session = session(&store);
    let navigation = Arc::new(FacetNavigation::from_definition(cars()).expect("navigation"));
    let layer = |name: &str, pairs: &[(&str, &str)], filters: &[&str]| {
        MirrorLayer::from_definition(
            &MirrorDefinition {
                name: name.to_string(),
                target: "cars".to_string(),
                facets: pairs.iter().map(|(facet, _)| facet.to_string()).collect(),
                values: pairs.iter().map(|(_, value)| value.to_string()).collect(),
                filters: filters.iter().map(ToString::to_string).collect(),
            },
            &navigation,
        )
        .expect("layer")
    };
    let outer = layer("red", &[("color", "red")], &[]);
    let middle = layer("not-audi", &[], &["hippo:brand != audi"]);
    let inner = layer("pricey", &[("price", "expensive")], &[]);

    let chained = NavigationRoot::through_chain(
        Arc::clone(&navigation),
        &[outer.clone(), middle.clone(), inner.clone()],
    );
    let left = NavigationRoot::new(Arc::clone(&navigation))
        .through(&MirrorLayer::merge(&MirrorLayer::merge(&outer, &middle), &inner));
    let right = NavigationRoot::new(Arc::clone(&navigation))
        .through(&MirrorLayer::merge(&outer, &MirrorLayer::merge(&middle, &inner)));

    assert_eq!(chained.prefix(), left.prefix());
    assert_eq!(left.prefix(), right.prefix());
    assert_eq!(session.resolve_path(&chained, "").expect("count").count, 1);
    for path in ["", "brand", "resultset"] {
        let a = session.resolve_path(&chained, path).expect("chained");
        let b = session.resolve_path(&left, path).expect("left");
        let c = session.resolve_path(&right, path).expect("right");
        assert_eq!(a.count, b.count, "{path}");
        assert_eq!(b.count, c.count, "{path}");
        assert_eq!(a.children, b.children, "{path}");
        assert_eq!(b.children, c.children, "{path}");
    }
    assert_eq!(chained.mirrors(), ["red", "not-audi", "pricey"]);
}

#[test]
fn repeated_positions_are_answered_from_the_session_cache() {
    let store = store();
    let mut session = session(&store);
    let nav = root(cars());
    session.resolve_path(&nav, "brand").expect("first");
    let after_first = session.cache_stats();
    session.resolve_path(&nav, "brand").expect("second");
    let after_second = session.cache_stats();
    assert_eq!(after_second.misses, after_first.misses);
    assert!(after_second.hits > after_first.hits);
}

#[test]
fn definition_validation_is_a_configuration_error() {
    let mut too_many_orders = cars();
    too_many_orders.sort_order = vec!["ascending".to_string()];
    let cases = [
        FacetNavigationDefinition::new("", "/content"),
        FacetNavigationDefinition::new("a/b", "/content"),
        FacetNavigationDefinition::new("cars", "relative"),
        cars().filter("(hippo:brand = bmw"),
        too_many_orders,
    ];
    for definition in cases {
        let err = FacetNavigation::from_definition(definition).expect_err("invalid");
        assert_eq!(err.code(), "INVALID_CONFIG", "{err}");
    }
}

#[test]
fn fingerprint_tracks_definition_content() {
    let a = FacetNavigation::from_definition(cars()).expect("a");
    let b = FacetNavigation::from_definition(cars()).expect("b");
    let c = FacetNavigation::from_definition(cars().filter("hippo:brand = bmw")).expect("c");
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
}
