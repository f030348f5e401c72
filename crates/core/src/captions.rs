use crate::types::{AlignedCaption, Segment};

/// Re-time transcript segments onto an output clip that starts `time_offset`
/// seconds into the source and lasts `output_duration` seconds.
///
/// Segments wholly outside the clip, with blank text, or whose clamped span
/// is empty are dropped; the rest are clamped to `[0, output_duration]`. Order is preserved. An empty
/// result is valid and means the clip is rendered without captions.
pub fn align_captions(
    segments: &[Segment],
    output_duration: f64,
    time_offset: f64,
) -> Vec<AlignedCaption> {
    segments
        .iter()
        .filter_map(|seg| {
            let adj_start = seg.start - time_offset;
            let adj_end = seg.end - time_offset;

            if adj_end <= 0.0 || adj_start >= output_duration {
                return None;
            }

            let text = seg.text.trim();
            if text.is_empty() {
                return None;
            }

            let (start, end) = (adj_start.max(0.0), adj_end.min(output_duration));
            if start >= end {
                return None;
            }

            Some(AlignedCaption {
                text: text.to_string(),
                start,
                end,
            })
        })
        .collect()
}

/// How captions look once burned into the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_name: String,
    /// Font size as a fraction of frame height
    pub font_scale: f64,
    pub side_margin: u32,
    pub bottom_margin: u32,
    /// `&HAABBGGRR`
    pub text_colour: String,
    pub box_colour: String,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_name: "Noto Sans CJK SC Bold".to_string(),
            font_scale: 0.05,
            side_margin: 40,
            bottom_margin: 100,
            text_colour: "&H00FFFFFF".to_string(),
            // #2E2E2E at 85% opacity
            box_colour: "&H262E2E2E".to_string(),
        }
    }
}

impl CaptionStyle {
    pub fn font_size(&self, frame_height: u32) -> u32 {
        ((frame_height as f64 * self.font_scale) as u32).max(1)
    }
}

/// Render captions as an ASS script sized to the output frame.
///
/// Captions are bottom-centred, wrapped inside the side margins and drawn on
/// an opaque box.
pub fn render_ass(
    captions: &[AlignedCaption],
    width: u32,
    height: u32,
    style: &CaptionStyle,
) -> String {
    let mut output = String::new();

    output.push_str("[Script Info]\n");
    output.push_str("ScriptType: v4.00+\n");
    output.push_str(&format!("PlayResX: {}\nPlayResY: {}\n", width, height));
    output.push_str("WrapStyle: 0\n\n");

    output.push_str("[V4+ Styles]\n");
    output.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    // BorderStyle 3 draws an opaque box in OutlineColour; Alignment 2 is bottom centre
    output.push_str(&format!(
        "Style: Default,{},{},{},{},{},{},-1,0,0,0,100,100,0,0,3,8,0,2,{},{},{},1\n\n",
        style.font_name,
        style.font_size(height),
        style.text_colour,
        style.text_colour,
        style.box_colour,
        style.box_colour,
        style.side_margin,
        style.side_margin,
        style.bottom_margin,
    ));

    output.push_str("[Events]\n");
    output.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
    for caption in captions {
        output.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            format_ass_time(caption.start),
            format_ass_time(caption.end),
            escape_ass_text(&caption.text)
        ));
    }

    output
}

/// `H:MM:SS.cc`
pub fn format_ass_time(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let mins = (total_cs / 6_000) % 60;
    let secs = (total_cs / 100) % 60;
    let cs = total_cs % 100;
    format!("{}:{:02}:{:02}.{:02}", hours, mins, secs, cs)
}

fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace("\r\n", "\\N")
        .replace('\n', "\\N")
}
