//! Region-aware partitioning: margin colors come from the owning region.

use elai::parallel::{Comm, SerialComm, ThreadComm};
use elai::topology::{Family, Neighbour, PackedElement as P, SetNeighbour, Space};
use elai::Subjugator;

type Fam = Family<P, SetNeighbour<P>>;

/// Region `r` of a chain of eight nodes split in halves: owns `4r..4r+4` under
/// color `r` and sees its neighbour across the cut as a ghost.
fn region(r: u32) -> (Space<P>, Fam) {
    let (lo, hi) = (4 * r, 4 * r + 4);
    let mut s = Space::new();
    let mut fam = Fam::new();
    for i in lo..hi {
        s.join(P::new(i, r));
        let mut u = SetNeighbour::from_element(P::new(i, r));
        if i > 0 {
            u.join(P::new(i - 1, r));
        }
        if i + 1 < 8 {
            u.join(P::new(i + 1, r));
        }
        fam.join(u);
    }
    let (ghost, owner) = if r == 0 { (4, 1) } else { (3, 0) };
    s.join_ghost(P::new(ghost, r), P::new(ghost, owner));
    (s, fam)
}

/// Each region colors its own half; the ghost takes the color its owner assigned.
#[test]
fn ghost_colors_resolve_across_regions() {
    let colors = ThreadComm::run(2, |c| {
        let r = c.rank() as u32;
        let (base, fam) = region(r);
        let palette = [2 * r, 2 * r + 1];
        let intra = SerialComm::new();
        let subj = Subjugator::with_regions(&base, &fam, &palette, &intra, Some(&c));
        let own: Vec<u32> = (4 * r..4 * r + 4).map(|i| subj.color(&P::new(i, r))).collect();
        let ghost = if r == 0 { 4 } else { 3 };
        (own, subj.color(&P::new(ghost, r)))
    });

    assert_eq!(colors[0].0, vec![0, 0, 1, 1]);
    assert_eq!(colors[1].0, vec![2, 2, 3, 3]);
    assert_eq!(colors[0].1, 2);
    assert_eq!(colors[1].1, 1);
}

/// Without a region layer the ghost keeps the color of its internal name.
#[test]
fn plain_partition_leaves_ghost_color() {
    let (base, fam) = region(0);
    let subj = Subjugator::new(&base, &fam, &[0, 1]);
    assert_eq!(subj.color(&P::new(4, 0)), 0);
    assert_eq!(subj.color(&P::new(3, 0)), 1);
}
