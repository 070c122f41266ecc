// SPDX-License-Identifier: MIT

//! Search pipeline specs: the full scan → upload → query → synthesize →
//! validate round trip, citation discipline, and expansion laws.

use crate::specs::prelude::*;
use carrel_core::passage_id;
use carrel_search::{normalize, Glossary, SearchPipeline, SearchRequest};

const PASSAGE: &str = "Concepts are formed by measurement-omission.";

fn pipeline(world: &SpecWorld) -> SearchPipeline<MockIndex, MockIndex, FakeClock> {
    SearchPipeline::new(
        Arc::clone(&world.mock),
        Arc::clone(&world.mock),
        world.store.clone(),
        world.clock.clone(),
    )
}

fn seed_chunks(world: &SpecWorld) {
    let chunks: Vec<GroundingChunk> = (0..5)
        .map(|index| GroundingChunk {
            file_id: format!("files/f{index}"),
            text: if index == 0 {
                PASSAGE.to_string()
            } else {
                format!("Supporting passage number {index}.")
            },
            meta: None,
        })
        .collect();
    world.mock.set_chunks(chunks);
}

#[tokio::test]
async fn full_round_trip_validates_every_claim_quote() {
    let world = SpecWorld::with_files(5);
    world
        .pool(world.manager(), PoolConfig::default())
        .run()
        .await
        .unwrap();
    assert_eq!(world.store.ingest_counts().unwrap().indexed, 5);

    seed_chunks(&world);
    world.mock.push_synthesis(Synthesis {
        claims: vec![Claim {
            claim_text: "Measurement omission is how concepts form.".into(),
            citation: Citation {
                file_id: "files/f0".into(),
                passage_id: passage_id("files/f0", PASSAGE).to_string(),
                // Hyphen dropped, case shifted: still the same text.
                quote: "Formed by Measurement Omission".into(),
            },
        }],
        summary: None,
    });

    let mut request = SearchRequest::new("how are concepts formed?");
    request.synthesize = true;
    let response = pipeline(&world).run(&request).await.unwrap();

    let synthesis = response.synthesis.unwrap();
    assert_eq!(synthesis.claims.len(), 1);
    // The round-trip law: every claim's normalized quote is a substring of
    // the normalized stored passage named by its citation.
    for claim in &synthesis.claims {
        let stored = world
            .store
            .get_passage(&claim.citation.passage_id)
            .unwrap()
            .unwrap();
        assert!(normalize(&stored.passage_text).contains(&normalize(&claim.citation.quote)));
    }
}

#[tokio::test]
async fn fabricated_quote_is_reprompted_then_dropped() {
    let world = SpecWorld::with_files(0);
    seed_chunks(&world);

    let fabricated = Claim {
        claim_text: "Concepts come from pure intuition.".into(),
        citation: Citation {
            file_id: "files/f0".into(),
            passage_id: passage_id("files/f0", PASSAGE).to_string(),
            quote: "concepts are formed by pure intuition".into(),
        },
    };
    let valid = Claim {
        claim_text: "Measurement omission forms concepts.".into(),
        citation: Citation {
            file_id: "files/f0".into(),
            passage_id: passage_id("files/f0", PASSAGE).to_string(),
            quote: "measurement omission".into(),
        },
    };
    // Attempt one: fabricated only. Attempt two: the fabrication persists
    // alongside a good claim; only the good claim survives.
    world.mock.push_synthesis(Synthesis {
        claims: vec![fabricated.clone()],
        summary: None,
    });
    world.mock.push_synthesis(Synthesis {
        claims: vec![valid, fabricated],
        summary: None,
    });

    let mut request = SearchRequest::new("concept formation");
    request.synthesize = true;
    let response = pipeline(&world).run(&request).await.unwrap();

    let synthesis = response.synthesis.unwrap();
    assert_eq!(synthesis.claims.len(), 1);
    assert_eq!(synthesis.claims[0].claim_text, "Measurement omission forms concepts.");
    assert!(response
        .warnings
        .iter()
        .any(|warning| warning.contains("dropped by citation validation")));
}

#[tokio::test]
async fn passage_identity_is_stable_across_queries() {
    let world = SpecWorld::with_files(0);
    seed_chunks(&world);
    let pipeline = pipeline(&world);

    let first = pipeline.run(&SearchRequest::new("alpha")).await.unwrap();
    let second = pipeline.run(&SearchRequest::new("beta")).await.unwrap();

    assert_eq!(first.passages[0].passage_id, second.passages[0].passage_id);
    assert_eq!(
        first.passages[0].passage_id,
        passage_id("files/f0", PASSAGE).to_string()
    );
}

#[tokio::test]
async fn expansion_without_glossary_match_is_identity() {
    let world = SpecWorld::with_files(0);
    seed_chunks(&world);
    let glossary =
        Glossary::parse("terms:\n  - term: altruism\n    synonyms: [selflessness]\n").unwrap();
    let pipeline = SearchPipeline::new(
        Arc::clone(&world.mock),
        Arc::clone(&world.mock),
        world.store.clone(),
        world.clock.clone(),
    )
    .with_glossary(glossary);

    let response = pipeline
        .run(&SearchRequest::new("capitalism and freedom"))
        .await
        .unwrap();
    assert_eq!(response.expanded_query, "capitalism and freedom");

    let response = pipeline
        .run(&SearchRequest::new("altruism in ethics"))
        .await
        .unwrap();
    assert_eq!(response.expanded_query, "altruism in ethics altruism selflessness");
}

#[tokio::test]
async fn ingest_and_search_share_the_session_event_log() {
    let world = SpecWorld::with_files(2);
    let session = world
        .store
        .create_session("thesis-research", "2026-01-01T00:00:00+00:00")
        .unwrap();

    let mut config = PoolConfig::default();
    config.session_id = Some(session.id.clone());
    world.pool(world.manager(), config).run().await.unwrap();

    seed_chunks(&world);
    let mut request = SearchRequest::new("concept formation");
    request.session_id = Some(session.id.clone());
    pipeline(&world).run(&request).await.unwrap();

    let events = world.store.list_events(&session.id).unwrap();
    assert!(!events.is_empty());
    // Monotonic, append-only ids.
    for pair in events.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
    assert!(events.iter().any(|e| e.event_type.to_string() == "search"));
}
