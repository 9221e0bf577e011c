//! FFmpeg video filter definitions.

use reelfit_models::Resolution;

/// Scale to fit inside `res` preserving aspect, then pad centered (letterbox).
pub fn filter_letterbox(res: Resolution) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = res.width,
        h = res.height
    )
}

/// Filter graph that letterboxes every input and joins them in order.
///
/// Produces a single video output labelled `[outv]`.
pub fn filter_concat_letterboxed(inputs: usize, res: Resolution, fps: u32) -> String {
    let mut graph = String::new();
    for i in 0..inputs {
        graph.push_str(&format!("[{i}:v]{},fps={fps}[v{i}];", filter_letterbox(res)));
    }
    for i in 0..inputs {
        graph.push_str(&format!("[v{i}]"));
    }
    graph.push_str(&format!("concat=n={inputs}:v=1:a=0[outv]"));
    graph
}
