//! Static tool descriptions for the IT document set.
//!
//! Every document gets two tools: a `_summary` tool backed by tree
//! summarisation for overviews, and a `_lookup` tool backed by vector
//! retrieval for exact facts. The retriever ranks tools on these texts, so
//! they name the topics each document covers.

/// One document and the descriptions of its two tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Document key; also the file stem under the documents directory.
    pub key: &'static str,
    pub title: &'static str,
    pub summary_description: &'static str,
    pub lookup_description: &'static str,
}

impl CatalogEntry {
    pub fn summary_tool_name(&self) -> String {
        format!("{}_summary", self.key)
    }

    pub fn lookup_tool_name(&self) -> String {
        format!("{}_lookup", self.key)
    }
}

pub const CATALOG: [CatalogEntry; 7] = [
    CatalogEntry {
        key: "company_it_policies",
        title: "Company IT Policies",
        summary_description: "Summarises whole sections of the company IT policy: password rules, \
            software installation approval, hardware requests, remote-work security and how \
            security incidents are handled. Use for an overview of a policy area or how \
            policies are enforced.",
        lookup_description: "Looks up exact policy clauses and values such as minimum password \
            length, account lockout thresholds, software approval requirements or the address \
            for reporting a security incident. Use when a policy detail must be quoted precisely.",
    },
    CatalogEntry {
        key: "installation_guides",
        title: "Installation Guides",
        summary_description: "Summarises complete installation guides: main steps, prerequisites, \
            common setup problems and where to get help. Use for an overview of installing Slack, \
            setting up Office 365 or connecting to the company VPN.",
        lookup_description: "Looks up specific installation steps, error messages, configuration \
            values, server addresses or support contacts from the installation instructions. Use \
            when exact steps or a fix for a setup error are needed.",
    },
    CatalogEntry {
        key: "it_support_categories",
        title: "IT Support Categories",
        summary_description: "Summarises each IT support category: the kinds of issues it covers, \
            typical resolution time and whether escalation is needed. Use to compare how \
            categories such as password resets and hardware failures are handled.",
        lookup_description: "Looks up the exact description, resolution time estimate or \
            escalation trigger of a single support category, for example when network issues \
            escalate or how long email setup takes.",
    },
    CatalogEntry {
        key: "knowledge_base",
        title: "Knowledge Base",
        summary_description: "Summarises knowledge base topics with their common problems and \
            recommended actions: password resets, software installation, hardware support, email \
            configuration and network issues. Use for an overview of a whole topic.",
        lookup_description: "Looks up exact troubleshooting steps, email server settings, reset \
            URLs, approved installation procedures, hardware replacement timelines or IT contact \
            details from the knowledge base. Use for step-by-step instructions.",
    },
    CatalogEntry {
        key: "sample_conversations",
        title: "Sample Conversations",
        summary_description: "Summarises the set of example support conversations: the scenarios \
            it contains, which categories come up, typical user requests and how escalations are \
            handled. Use for a high-level picture of the conversations.",
        lookup_description: "Looks up fields of an individual support conversation such as the \
            user's message, its assigned category, key parts of the reply or escalation details. \
            Use when precise wording from a conversation is needed.",
    },
    CatalogEntry {
        key: "test_requests",
        title: "Test Requests",
        summary_description: "Summarises the worked examples showing how support requests are \
            interpreted: how intent maps to a classification, which reply elements matter and \
            when to escalate. Use to understand the reasoning behind the examples.",
        lookup_description: "Looks up labelled example requests with their original text, expected \
            classification, recommended reply components and escalation flag. Use to find an \
            example similar to the user's request.",
    },
    CatalogEntry {
        key: "troubleshooting_database",
        title: "Troubleshooting Database",
        summary_description: "Summarises the troubleshooting procedures across issues: the general \
            workflow, escalation logic and who to contact. Use to understand or compare how \
            problems are worked through.",
        lookup_description: "Looks up the exact troubleshooting steps, escalation conditions or \
            support email for one issue, such as password resets, a slow computer, WiFi failures \
            or email sync problems.",
    },
];

/// Catalog entry for a document key.
pub fn find(key: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.key == key)
}
