// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton topologies.

/// COCO-Pose dataset skeleton structure (pairs of keypoint indices)
/// Defines which keypoints connect to form the pose skeleton
pub const SKELETON: [[usize; 2]; 19] = [
    [15, 13], // left ankle to left knee
    [13, 11], // left knee to left hip
    [16, 14], // right ankle to right knee
    [14, 12], // right knee to right hip
    [11, 12], // left hip to right hip
    [5, 11],  // left shoulder to left hip
    [6, 12],  // right shoulder to right hip
    [5, 6],   // left shoulder to right shoulder
    [5, 7],   // left shoulder to left elbow
    [6, 8],   // right shoulder to right elbow
    [7, 9],   // left elbow to left wrist
    [8, 10],  // right elbow to right wrist
    [1, 2],   // left eye to right eye
    [0, 1],   // nose to left eye
    [0, 2],   // nose to right eye
    [1, 3],   // left eye to left ear
    [2, 4],   // right eye to right ear
    [3, 5],   // left ear to left shoulder
    [4, 6],   // right ear to right shoulder
];

/// Limb color indices mapping to `POSE_COLORS`
/// Mapping: legs=orange, torso=pink, arms=blue, face=green
pub const LIMB_COLOR_INDICES: [usize; 19] = [
    0, 0, 0, 0, 7, 7, 7, 9, 9, 9, 9, 9, 16, 16, 16, 16, 16, 16, 16,
];

/// Keypoint color indices mapping to `POSE_COLORS`
pub const KPT_COLOR_INDICES: [usize; 17] = [16, 16, 16, 16, 16, 9, 9, 9, 9, 9, 9, 0, 0, 0, 0, 0, 0];

/// Number of joints in the `OpenPose` body layout.
pub const OPENPOSE_JOINTS: usize = 18;

/// Neck joint index in the `OpenPose` layout. It has no COCO counterpart.
pub const OPENPOSE_NECK: usize = 1;

/// COCO-17 source index for each `OpenPose` joint. `None` marks the neck, which
/// is synthesized from both shoulders.
pub const COCO_TO_OPENPOSE: [Option<usize>; OPENPOSE_JOINTS] = [
    Some(0),  // nose
    None,     // neck
    Some(6),  // right shoulder
    Some(8),  // right elbow
    Some(10), // right wrist
    Some(5),  // left shoulder
    Some(7),  // left elbow
    Some(9),  // left wrist
    Some(12), // right hip
    Some(14), // right knee
    Some(16), // right ankle
    Some(11), // left hip
    Some(13), // left knee
    Some(15), // left ankle
    Some(2),  // right eye
    Some(1),  // left eye
    Some(4),  // right ear
    Some(3),  // left ear
];

/// `OpenPose` body limbs over the 18 joints. Only the first 17 are drawn;
/// the last two (shoulder to ear) are part of the layout but left out of renders.
pub const OPENPOSE_LIMBS: [[usize; 2]; 19] = [
    [1, 2],
    [1, 5],
    [2, 3],
    [3, 4],
    [5, 6],
    [6, 7],
    [1, 8],
    [8, 9],
    [9, 10],
    [1, 11],
    [11, 12],
    [12, 13],
    [1, 0],
    [0, 14],
    [14, 16],
    [0, 15],
    [15, 17],
    [2, 16],
    [5, 17],
];

/// Number of `OpenPose` limbs that are rendered.
pub const OPENPOSE_DRAWN_LIMBS: usize = 17;

/// Hand skeleton over 21 keypoints (wrist, then four joints per finger).
pub const HAND_EDGES: [[usize; 2]; 20] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 4],
    [0, 5],
    [5, 6],
    [6, 7],
    [7, 8],
    [0, 9],
    [9, 10],
    [10, 11],
    [11, 12],
    [0, 13],
    [13, 14],
    [14, 15],
    [15, 16],
    [0, 17],
    [17, 18],
    [18, 19],
    [19, 20],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coco_to_openpose_is_a_permutation() {
        let mut seen: Vec<usize> = COCO_TO_OPENPOSE.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..17).collect::<Vec<_>>());
        assert_eq!(COCO_TO_OPENPOSE[OPENPOSE_NECK], None);
    }

    #[test]
    fn test_limbs_reference_valid_joints() {
        assert!(OPENPOSE_LIMBS.iter().flatten().all(|&j| j < OPENPOSE_JOINTS));
        assert!(SKELETON.iter().flatten().all(|&j| j < 17));
        assert!(HAND_EDGES.iter().flatten().all(|&j| j < 21));
    }
}
