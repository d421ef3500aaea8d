use std::fs;

use async_trait::async_trait;
use extract::{ExtractError, Extraction, ExtractionBackend, Extractor, MeetingRecord, PersonRecord};
use ingest::{FileReader, InputLayout};
use knowledge::{AggregationPolicy, BuildOptions, KnowledgeLayout, KnowledgeSet, Renderer, build};
use query::{FrontMatterFormat, KnowledgeStore, KnowledgeTools, parse_front_matter};

struct ProfileAndMeeting;

#[async_trait]
impl ExtractionBackend for ProfileAndMeeting {
    async fn extract(&self, _text: &str, _source: &str, doc_type: &str) -> Result<Extraction, ExtractError> {
        let mut extraction = Extraction::empty();
        match doc_type {
            "LinkedIn Profile" => {
                let mut person = PersonRecord::named("Caroline Van Cromphaut");
                person.company = Some("Proximus".into());
                extraction.people.push(person);
                extraction.organizations.push("Proximus".into());
            }
            "Meeting Notes" => extraction.meetings.push(MeetingRecord {
                title: "Account review".into(),
                date: Some("2025-03-02".into()),
                attendees: vec!["Caroline".into()],
                topics: vec!["Data platform".into()],
                source: None,
            }),
            other => panic!("unexpected document type {other}"),
        }
        Ok(extraction)
    }

    async fn consolidate(&self, names: &[String]) -> Result<Vec<String>, ExtractError> {
        Ok(names.to_vec())
    }
}

#[tokio::test]
async fn test_attendee_resolution_reaches_queries() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let profiles = raw.path().join("LinkedIn").join("Markdown (enhanced for AI interpretation)");
    fs::create_dir_all(&profiles).unwrap();
    fs::write(profiles.join("caroline.md"), "Caroline Van Cromphaut - Proximus").unwrap();
    let meetings = raw.path().join("NNR meeting");
    fs::create_dir_all(&meetings).unwrap();
    fs::write(meetings.join("review.md"), "Account review with Caroline").unwrap();

    let renderer = Renderer::new(KnowledgeLayout::new(out.path()), vec!["microsoft".into()]);
    build(
        &InputLayout::new(raw.path()),
        &FileReader::default(),
        &Extractor::new(Box::new(ProfileAndMeeting)),
        &AggregationPolicy::default(),
        &renderer,
        &BuildOptions::default(),
    )
    .await
    .unwrap();

    let store = KnowledgeStore::new(out.path());
    let meeting = &store.load(knowledge::Category::Meetings).unwrap()[0];
    assert_eq!(meeting.front.list("attendees"), vec!["Caroline Van Cromphaut"]);

    let tools = KnowledgeTools::new(store);
    let found = tools.find_entity_knowledge("people", "Caroline");
    assert!(found.contains("Caroline Van Cromphaut"), "{found}");
    assert!(found.contains("organization: Proximus"), "{found}");

    let network = tools.get_person_network("Caroline");
    assert!(network.contains("Account review (2025-03-02)"), "{network}");
}

#[test]
fn test_rendered_values_read_back_unchanged() {
    let out = tempfile::tempdir().unwrap();
    let mut person = PersonRecord::named("Jane Doe");
    person.role = Some("Chief Data Officer".into());
    person.company = Some("Proximus".into());
    person.location = Some("Brussels, Belgium".into());
    person.skills = vec!["Azure".into(), "Power BI".into()];

    let set = KnowledgeSet {
        people: vec![person],
        meetings: vec![MeetingRecord {
            title: "Sync at 10:00".into(),
            date: Some("2025-01-14".into()),
            attendees: vec!["Jane Doe".into()],
            ..Default::default()
        }],
        ..Default::default()
    };
    Renderer::new(KnowledgeLayout::new(out.path()), Vec::new()).render(&set);

    let text = fs::read_to_string(out.path().join("entities/people/jane-doe.md")).unwrap();
    let (front, _) = parse_front_matter(&text).unwrap();
    assert_eq!(front.format, FrontMatterFormat::Yaml);
    assert_eq!(front.text("name"), Some("Jane Doe"));
    assert_eq!(front.text("role"), Some("Chief Data Officer"));
    assert_eq!(front.text("location"), Some("Brussels, Belgium"));
    assert_eq!(front.list("skills"), vec!["Azure", "Power BI"]);

    // colons survive because the front matter is YAML
    let text = fs::read_to_string(out.path().join("events/meetings/sync-at-1000.md")).unwrap();
    let (front, _) = parse_front_matter(&text).unwrap();
    assert_eq!(front.text("title"), Some("Sync at 10:00"));
}
