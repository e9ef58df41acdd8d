mod support;

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use support::*;
use wr_app::{MergeRequest, PersistenceTier, Reassembler, ReassemblyError};
use wr_core::ids::SessionId;
use wr_core::media::{ContainerKind, RepairStrategy, EBML_HEADER_SKELETON};
use wr_core::ports::{MediaProbePort, PartStorePort};
use wr_core::recording::{Part, StorageTier};
use wr_infra::{MemoryPartStore, StructuralMediaProbe};

struct Fixture {
    memory: Arc<MemoryPartStore>,
    persistence: Arc<PersistenceTier>,
}

async fn fixture() -> Fixture {
    let memory = Arc::new(MemoryPartStore::new());
    let persistence = persistence(vec![memory.clone() as Arc<dyn PartStorePort>]);
    persistence
        .begin_session(SessionId::from("20250101_000000"))
        .await
        .unwrap();
    Fixture {
        memory,
        persistence,
    }
}

impl Fixture {
    async fn save_all(&self, payloads: &[Vec<u8>], container: ContainerKind) -> Vec<Part> {
        let mut parts = Vec::new();
        for payload in payloads {
            parts.push(
                self.persistence
                    .save(payload, container.extension(), container.default_mime().as_str())
                    .await
                    .unwrap(),
            );
        }
        parts
    }

    fn reassembler(&self, probe: Arc<dyn MediaProbePort>) -> Reassembler {
        Reassembler::new(self.persistence.clone(), probe, Duration::from_millis(200))
    }
}

fn request(parts: Vec<Part>, container: ContainerKind) -> MergeRequest {
    MergeRequest {
        parts,
        leftover: None,
        container,
        file_name: format!("demo_完整录制.{}", container.extension()),
    }
}

#[tokio::test]
async fn nothing_to_merge_is_a_no_op() {
    let f = fixture().await;
    let merged = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(Vec::new(), ContainerKind::WebM))
        .await
        .unwrap();
    assert!(merged.is_none());
}

#[tokio::test]
async fn parts_are_concatenated_in_number_order() {
    let f = fixture().await;
    let mut parts = f
        .save_all(&[b"aa".to_vec(), b"bb".to_vec(), b"cc".to_vec()], ContainerKind::Mp4)
        .await;
    parts.reverse();

    let mut req = request(parts, ContainerKind::Mp4);
    req.leftover = Some(Bytes::from_static(b"dd"));

    let outcome = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(req)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.bytes.as_ref(), b"aabbccdd");
    assert_eq!(outcome.parts_merged, 3);
}

#[tokio::test]
async fn fragmented_mp4_parts_pass_validation_without_repair() {
    let f = fixture().await;
    let parts = f
        .save_all(&[mp4_file(1), mp4_file(2)], ContainerKind::Mp4)
        .await;

    let outcome = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(parts, ContainerKind::Mp4))
        .await
        .unwrap()
        .unwrap();

    assert!(outcome.valid);
    assert_eq!(outcome.repair, None);
    assert_eq!(outcome.remediation, None);
    let mut expected = mp4_file(1);
    expected.extend(mp4_file(2));
    assert_eq!(outcome.bytes.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn broken_mp4_runs_noop_repair_and_is_flagged() {
    let f = fixture().await;
    let parts = f
        .save_all(&[mp4_file(1), b"\0\0\0\x40junk".to_vec()], ContainerKind::Mp4)
        .await;

    let outcome = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(parts, ContainerKind::Mp4))
        .await
        .unwrap()
        .unwrap();

    assert!(!outcome.valid);
    assert_eq!(outcome.repair, Some(RepairStrategy::NoOpRepair));
    assert!(outcome.bytes.ends_with(b"junk"));
    let hint = outcome.remediation.unwrap();
    assert!(hint.starts_with("ffmpeg -i \"demo_完整录制.mp4\""));
}

#[tokio::test]
async fn concatenated_webm_accepted_by_header_check() {
    let f = fixture().await;
    let parts = f
        .save_all(&[webm_document(1), webm_document(2)], ContainerKind::WebM)
        .await;

    let outcome = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(parts, ContainerKind::WebM))
        .await
        .unwrap()
        .unwrap();

    assert!(outcome.valid);
    assert_eq!(outcome.repair, None);
    let mut expected = webm_document(1);
    expected.extend(webm_document(2));
    assert_eq!(outcome.bytes.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn headerless_webm_gets_synthesized_header() {
    let f = fixture().await;
    let parts = f
        .save_all(&[webm_cluster(1), webm_cluster(2)], ContainerKind::WebM)
        .await;

    let outcome = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(parts, ContainerKind::WebM))
        .await
        .unwrap()
        .unwrap();

    assert!(!outcome.valid);
    assert_eq!(outcome.repair, Some(RepairStrategy::HeaderSynthesisRepair));
    assert!(outcome.bytes.starts_with(&EBML_HEADER_SKELETON));
    assert_eq!(
        outcome.bytes.len(),
        EBML_HEADER_SKELETON.len() + 2 * webm_cluster(1).len()
    );
}

#[tokio::test]
async fn header_is_synthesized_whatever_the_payload_starts_with() {
    let f = fixture().await;
    let parts = f
        .save_all(&[b"xx".to_vec(), b"yy".to_vec()], ContainerKind::WebM)
        .await;

    let outcome = f
        .reassembler(Arc::new(RejectingProbe))
        .merge_all(request(parts, ContainerKind::WebM))
        .await
        .unwrap()
        .unwrap();

    assert!(!outcome.valid);
    assert_eq!(outcome.repair, Some(RepairStrategy::HeaderSynthesisRepair));
    let mut expected = EBML_HEADER_SKELETON.to_vec();
    expected.extend_from_slice(b"xxyy");
    assert_eq!(outcome.bytes.as_ref(), expected.as_slice());
    assert!(outcome.remediation.is_some());
}

#[tokio::test]
async fn lost_first_part_gets_header_before_mid_cluster_data() {
    let f = fixture().await;
    // SimpleBlock elements, as left over when a cluster spans several parts.
    let block_a = vec![0xA3, 0x84, 0x81, 0x00, 0x00, 0x80];
    let block_b = vec![0xA3, 0x84, 0x81, 0x00, 0x21, 0x80];
    let parts = f
        .save_all(
            &[webm_document(1), block_a.clone(), block_b.clone()],
            ContainerKind::WebM,
        )
        .await;
    f.persistence.delete(&parts[0]).await;

    let outcome = f
        .reassembler(Arc::new(RejectingProbe))
        .merge_all(request(parts, ContainerKind::WebM))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.parts_skipped, 1);
    assert!(!outcome.valid);
    assert_eq!(outcome.repair, Some(RepairStrategy::HeaderSynthesisRepair));
    assert!(outcome.bytes.starts_with(&EBML_HEADER_SKELETON));
    let mut expected = EBML_HEADER_SKELETON.to_vec();
    expected.extend(block_a);
    expected.extend(block_b);
    assert_eq!(outcome.bytes.as_ref(), expected.as_slice());
    assert!(outcome.remediation.is_some());
}

#[tokio::test]
async fn degraded_save_reads_back_identical_bytes() {
    let persistence = persistence(vec![
        Arc::new(FailingStore(StorageTier::SandboxedFs)) as Arc<dyn PartStorePort>,
        Arc::new(MemoryPartStore::new()),
    ]);
    let capability = persistence
        .begin_session(SessionId::from("20250101_000000"))
        .await
        .unwrap();
    assert_eq!(capability.tier, StorageTier::SandboxedFs);

    let payload = webm_document(4);
    let part = persistence.save(&payload, "webm", "video/webm").await.unwrap();

    assert_eq!(part.tier, StorageTier::Memory);
    assert_eq!(persistence.read(&part).await.unwrap().as_ref(), payload.as_slice());
}

#[tokio::test]
async fn unreadable_part_is_skipped_and_flagged() {
    let f = fixture().await;
    let parts = f
        .save_all(
            &[webm_document(1), webm_cluster(2), webm_cluster(3)],
            ContainerKind::WebM,
        )
        .await;
    f.persistence.delete(&parts[1]).await;

    let outcome = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(parts, ContainerKind::WebM))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.parts_merged, 2);
    assert_eq!(outcome.parts_skipped, 1);
    assert!(!outcome.valid);
    let mut expected = webm_document(1);
    expected.extend(webm_cluster(3));
    assert_eq!(outcome.bytes.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn no_readable_parts_is_a_hard_failure() {
    let f = fixture().await;
    let parts = f
        .save_all(&[b"a".to_vec(), b"b".to_vec()], ContainerKind::WebM)
        .await;
    for part in &parts {
        f.persistence.delete(part).await;
    }

    let err = f
        .reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(parts, ContainerKind::WebM))
        .await
        .unwrap_err();
    assert!(matches!(err, ReassemblyError::NoReadableParts { attempted: 2 }));
}

#[tokio::test]
async fn merge_deletes_parts_afterwards() {
    let f = fixture().await;
    let parts = f
        .save_all(&[mp4_file(1), mp4_file(2)], ContainerKind::Mp4)
        .await;
    assert!(f.memory.retained_bytes().await > 0);

    f.reassembler(Arc::new(StructuralMediaProbe::new()))
        .merge_all(request(parts, ContainerKind::Mp4))
        .await
        .unwrap();

    assert_eq!(f.memory.retained_bytes().await, 0);
}

#[tokio::test]
async fn validate_checks_size_signature_and_metadata() {
    let f = fixture().await;
    let reassembler = f.reassembler(Arc::new(StructuralMediaProbe::new()));

    assert!(!reassembler.validate(&Bytes::new(), ContainerKind::Mp4).await);
    assert!(
        !reassembler
            .validate(&Bytes::from(webm_document(1)), ContainerKind::Mp4)
            .await
    );
    assert!(
        reassembler
            .validate(&Bytes::from(mp4_file(1)), ContainerKind::Mp4)
            .await
    );
    assert!(
        reassembler
            .validate(&Bytes::from(webm_document(1)), ContainerKind::WebM)
            .await
    );
}

#[tokio::test(start_paused = true)]
async fn validation_times_out() {
    let f = fixture().await;
    let reassembler = f.reassembler(Arc::new(HangingProbe));

    assert!(
        !reassembler
            .validate(&Bytes::from(mp4_file(1)), ContainerKind::Mp4)
            .await
    );
}
