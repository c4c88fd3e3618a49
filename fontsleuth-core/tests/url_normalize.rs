use fontsleuth_core::urlnorm::normalize_url;
use proptest::prelude::*;

#[test]
fn documented_example_strips_everything() {
    assert_eq!(
        normalize_url("https://a.com/x/?utm_source=foo&ref=bar#sec"),
        "https://a.com/x"
    );
}

#[test]
fn empty_trailing_segments_normalize_like_a_single_slash() {
    let doubled = normalize_url("https://a.com/x//?utm_source=mail");
    assert_eq!(doubled, normalize_url("https://a.com/x/"));
    assert_eq!(normalize_url(&doubled), doubled);
}

#[test]
fn unrelated_parameters_survive_in_order() {
    assert_eq!(
        normalize_url("https://a.com/search?q=fonts&utm_medium=mail&page=2&gclid=xyz"),
        "https://a.com/search?q=fonts&page=2"
    );
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9-]{0,8}"
}

fn param() -> impl Strategy<Value = (String, String)> {
    (
        prop_oneof![
            Just("utm_source".to_string()),
            Just("utm_campaign".to_string()),
            Just("ref".to_string()),
            Just("sid".to_string()),
            Just("_ga".to_string()),
            "[a-z]{1,6}",
        ],
        "[a-z0-9]{0,6}",
    )
}

fn url_like() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("https://"), Just("http://"), Just("")],
        "[a-z]{1,10}\\.(com|org|example)",
        prop::collection::vec(segment(), 0..4),
        any::<bool>(),
        prop::collection::vec(param(), 0..5),
        prop::option::of("[a-z0-9]{0,6}"),
    )
        .prop_map(|(scheme, host, segments, slash, params, fragment)| {
            let mut url = format!("{scheme}{host}");
            for seg in &segments {
                url.push('/');
                url.push_str(seg);
            }
            if slash {
                url.push('/');
            }
            if !params.is_empty() {
                let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                url.push('?');
                url.push_str(&query.join("&"));
            }
            if let Some(fragment) = fragment {
                url.push('#');
                url.push_str(&fragment);
            }
            url
        })
}

proptest! {
    #[test]
    fn normalization_is_idempotent(raw in url_like()) {
        let once = normalize_url(&raw);
        prop_assert_eq!(normalize_url(&once), once.clone());
    }

    #[test]
    fn normalized_urls_carry_no_fragment_or_tracking(raw in url_like()) {
        let normalized = normalize_url(&raw);
        prop_assert!(!normalized.contains('#'));
        prop_assert!(!normalized.contains("utm_"));
        prop_assert!(!normalized.ends_with('/'));
    }

    #[test]
    fn arbitrary_text_never_panics(raw in ".{0,40}") {
        let _ = normalize_url(&raw);
    }
}
