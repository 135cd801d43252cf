// Classification pipelines.
//
// `model_path` translates and scores titles one at a time with the trained
// model, then applies the keyword override. `llm_path` classifies titles in
// small batches through the generative model under a request budget. Both
// checkpoint progress as they go and can resume an interrupted run.

pub mod llm_path;
pub mod model_path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::records::ProspectInput;

/// Keep the longest prefix of checkpointed entries that lines up with the
/// input: entry `i` must carry index `i` and the id of input `i`.
pub fn resume_prefix<T, F>(entries: Vec<T>, inputs: &[ProspectInput], key: F) -> Vec<T>
where
    F: Fn(&T) -> (Option<usize>, &str),
{
    let total = entries.len();
    let mut restored = Vec::with_capacity(total);

    for (position, entry) in entries.into_iter().enumerate() {
        let (index, id) = key(&entry);
        let lines_up = index == Some(position)
            && inputs
                .get(position)
                .is_some_and(|input| input.id_text() == id);
        if !lines_up {
            warn!(
                position,
                "Progress log diverges from input here; resuming from this entry"
            );
            break;
        }
        restored.push(entry);
    }

    if !restored.is_empty() {
        info!(restored = restored.len(), logged = total, "Resuming from progress log");
    }
    restored
}

/// Progress bar in the shared style. Hidden when `len` is zero.
pub(crate) fn progress_bar(len: usize, label: &str) -> ProgressBar {
    if len == 0 {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!("  {label} [{{bar:30}}] {{pos}}/{{len}} ({{eta}})"))
            .expect("valid template"),
    );
    pb
}
