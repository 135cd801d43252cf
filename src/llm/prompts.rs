// Instruction prompt for batch title classification.

/// Fixed instructions sent with every batch. The titles are appended as a
/// JSON array, verbatim.
pub const CLASSIFICATION_INSTRUCTIONS: &str = r#"
You work for a Vision AI startup that builds AI agents to monitor equipment, materials, and processes in manufacturing industries like cement, steel, and metals.

Classify each job title as either **RELEVANT** or **NOT RELEVANT** for outreach.

**Instructions:**

1. Mark a title as **RELEVANT** only if:
   - The person is in a **white collar role** at **middle management or higher** (e.g. Inspector, Supervisor, Engineer, Manager, Head, VP, Director, CXO). Exclude interns, field workers or **blue-collar roles**.
   - The person works in one of the following relevant domains:
     - **Operations**: plant manager, operations, production, manufacturing head, shift incharge
     - **Maintenance**: maintenance, mechanical, electrical, technician, reliability
     - **Process**: process, optimization, optimisation
     - **Quality**: quality, QA, QC, compliance
     - **Safety**: safety, HSE, EHS
     - **R&D**: R&D, research, development
     - **Procurement**: procurement, purchase, buyer, sourcing
     - **Projects**: project, capex, engineering manager
     - **Automation**: automation, instrumentation, control systems
     - **IT/Digital**: digital, IT, data, AI, ML, software, innovation
     - **Leadership**: chief, CEO, COO, CTO, president, VP, director

2. Titles with clear **seniority** but **no department mentioned** are **RELEVANT** by default, as such roles often influence purchasing and digital adoption.

3. Titles from **irrelevant departments** (HR, Admin, Legal, Finance, Talent, Marketing) are **NOT RELEVANT**, even if senior.

4. Apply reasoning; don't rely solely on keywords. For example, "Manager" is relevant, but "Finance Manager" is not.

5. Translate non-English titles before classification.

6. All titles that **end** with the word **analyst** are **NOT RELEVANT**.

**Output Format:**
Return a JSON list with exactly one entry per title, in the same order as the input:
[
  {
    "original_title": "...",
    "translated_title": "...",
    "verdict": "RELEVANT" or "NOT RELEVANT"
  },
  ...
]
Here are the titles:
"#;

/// Build the prompt for one batch of titles.
pub fn classification_prompt(titles: &[&str]) -> String {
    // Serializing a slice of &str cannot fail.
    let titles_json = serde_json::to_string(titles).unwrap_or_else(|_| "[]".to_string());
    format!("{CLASSIFICATION_INSTRUCTIONS}{titles_json}\n")
}
