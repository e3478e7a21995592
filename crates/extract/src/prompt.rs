pub fn build_structuring_prompt(raw_query: &str) -> String {
    format!(
        r#"You are an expert at parsing health insurance claim queries.

INSTRUCTIONS:
1. Extract the claim facts stated in the query below
2. Output ONLY valid JSON, nothing else
3. Use the exact schema below; use null for anything the query does not state

SCHEMA:
{{
  "age": 46,
  "gender": "male|female",
  "procedure": "knee surgery",
  "location": "Pune",
  "policy_duration_months": 3,
  "claim_amount": null,
  "claim_type": "hospitalization|outpatient|maternity|null",
  "pre_existing": null,
  "pre_authorized": null,
  "planned_treatment": null,
  "submitted_days": null,
  "pre_hosp_days": null,
  "post_hosp_days": null
}}

RULES:
- policy_duration_months is the age of the policy in months ("1 year old policy" is 12), null if not stated
- claim_amount is a plain number in rupees ("2 lakh" is 200000)
- Output ONLY the JSON object, no markdown, no explanations

QUERY:
{}

JSON OUTPUT:"#,
        raw_query
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
