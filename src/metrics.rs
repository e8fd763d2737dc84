//! Metric recording helpers. Names follow Prometheus conventions and are
//! kept in one place so nothing else in the crate deals in metric strings.

use metrics::counter;

pub fn http_request(route: &'static str) {
    counter!("routeboard_http_requests_total", "route" => route).increment(1);
}

pub fn letter_generated() {
    counter!("routeboard_letters_generated_total").increment(1);
}

pub fn letter_fallback() {
    counter!("routeboard_letters_fallback_total").increment(1);
}

pub fn letter_sent() {
    counter!("routeboard_letters_sent_total").increment(1);
}

pub fn letter_failed() {
    counter!("routeboard_letters_failed_total").increment(1);
}

pub fn feed_fetch_success(source: &str) {
    counter!("routeboard_feed_fetch_success_total", "source" => source.to_string()).increment(1);
}

pub fn feed_fetch_error(source: &str) {
    counter!("routeboard_feed_fetch_error_total", "source" => source.to_string()).increment(1);
}

pub fn feed_items_parsed(source: &str, count: u64) {
    counter!("routeboard_feed_items_parsed_total", "source" => source.to_string()).increment(count);
}

pub fn card_rendered() {
    counter!("routeboard_cards_rendered_total").increment(1);
}
