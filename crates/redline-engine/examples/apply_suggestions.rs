use redline_engine::prelude::*;

fn main() {
    let document = concat!(
        "<p>Payment is due within 30 days of invoice.</p>",
        "<p>This agreement is governed by the laws of <strong>New York</strong>.</p>",
    );

    let suggestions = vec![
        Suggestion {
            id: "r1".into(),
            kind: SuggestionKind::Risk,
            original: "due within 30 days".into(),
            replacement: "due within 60 days".into(),
            rationale: Some("longer payment window".into()),
            severity: None,
            order: 0,
            state: AppliedState::Pending,
        },
        Suggestion {
            id: "c1".into(),
            kind: SuggestionKind::JurisdictionChange,
            original: "New York".into(),
            replacement: "Delaware".into(),
            rationale: None,
            severity: None,
            order: 1,
            state: AppliedState::Pending,
        },
    ];

    for suggestion in &suggestions {
        match locate(document, &suggestion.original) {
            Some(located) => println!(
                "{}: matched via {:?} at {}..{}",
                suggestion.id, located.strategy, located.start, located.end
            ),
            None => println!("{}: no match", suggestion.id),
        }
    }

    let (patched, report) = apply_all(document, &suggestions);
    for entry in &report {
        println!("{}: applied={}", entry.id, entry.applied());
    }
    println!("{patched}");
}
