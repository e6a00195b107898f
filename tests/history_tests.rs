use pretty_assertions::assert_eq;
use retouch::{HistoryStack, Raster, RasterId};

fn history_of(n: usize) -> (HistoryStack, Vec<Raster>) {
    let mut h = HistoryStack::new();
    let rasters: Vec<Raster> = (0..=n).map(|i| Raster::filled(1, 1, [i as u8, 0, 0, 255])).collect();
    for (i, r) in rasters.iter().enumerate() {
        h.commit(r.clone(), format!("R{}", i));
    }
    (h, rasters)
}

fn ids(h: &HistoryStack) -> Vec<RasterId> {
    h.entries().iter().map(|e| e.raster.id()).collect()
}

#[test]
fn k_undos_after_n_commits() {
    let n = 5;
    for k in 0..=n {
        let (mut h, rasters) = history_of(n);
        for _ in 0..k {
            assert!(h.undo());
        }
        assert_eq!(h.current(), Some(&rasters[n - k]));
        assert_eq!(h.can_redo(), k > 0);
        assert_eq!(h.can_undo(), k < n);
    }
}

#[test]
fn commit_after_undo_truncates() {
    let (mut h, rasters) = history_of(2);
    assert!(h.undo());
    let fresh = Raster::filled(1, 1, [9, 9, 9, 255]);
    h.commit(fresh.clone(), "R'");
    assert_eq!(ids(&h), vec![rasters[0].id(), rasters[1].id(), fresh.id()]);
    assert_eq!(h.cursor(), Some(2));
    assert!(!h.can_redo());
    assert!(!h.redo());
}

#[test]
fn reset_keeps_every_entry() {
    let (mut h, rasters) = history_of(2);
    let before = ids(&h);
    assert!(h.reset_to_original());
    assert_eq!(h.cursor(), Some(0));
    assert_eq!(ids(&h), before);
    assert_eq!(h.current(), Some(&rasters[0]));
    assert!(h.can_redo());
    assert!(h.redo());
    assert_eq!(h.current(), Some(&rasters[1]));
}

#[test]
fn empty_history_is_inert() {
    let mut h = HistoryStack::new();
    assert_eq!(h.cursor(), None);
    assert!(h.current().is_none());
    assert!(h.original().is_none());
    assert!(!h.undo());
    assert!(!h.redo());
    assert!(!h.reset_to_original());
    assert!(!h.can_undo());
    assert!(!h.can_redo());
}

#[test]
fn replace_all_starts_over_with_one_entry() {
    let (mut h, _) = history_of(3);
    let generated = Raster::filled(2, 2, [1, 2, 3, 255]);
    h.replace_all(generated.clone(), "Generated");
    assert_eq!(h.len(), 1);
    assert_eq!(h.original(), Some(&generated));
    assert_eq!(h.descriptions(), vec!["Generated".to_string()]);
    assert_eq!(h.memory_usage(), generated.memory_bytes());
}
