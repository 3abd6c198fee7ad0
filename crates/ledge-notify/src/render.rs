use ledge_core::alert::{Alert, AlertKind, AlertReason};
use ledge_core::client::Client;
use ledge_core::loan::Loan;

/// Rendering locale, passed explicitly wherever text is produced.
/// French is the institution's operating language.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl std::str::FromStr for Locale {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fr" => Ok(Self::Fr),
            "en" => Ok(Self::En),
            other => Err(format!("unknown locale: {other}")),
        }
    }
}

/// One-line alert message for a candidate's structured reason.
pub fn render_message(kind: AlertKind, reason: &AlertReason, locale: Locale) -> String {
    match (kind, reason, locale) {
        (AlertKind::ValidityCritical, AlertReason::OfferExpiring { days_remaining }, Locale::Fr) => {
            format!("URGENT: L'offre de prêt expire dans {days_remaining} jours!")
        }
        (AlertKind::ValidityCritical, AlertReason::OfferExpiring { days_remaining }, Locale::En) => {
            format!("URGENT: the loan offer expires in {days_remaining} days!")
        }
        (AlertKind::ValidityWarning, AlertReason::OfferExpiring { days_remaining }, Locale::Fr) => {
            format!("Attention: Il reste {days_remaining} jours avant l'expiration de l'offre")
        }
        (AlertKind::ValidityWarning, AlertReason::OfferExpiring { days_remaining }, Locale::En) => {
            format!("Warning: {days_remaining} days left before the offer expires")
        }
        (_, AlertReason::WorkBehindSchedule { completion_pct, expected_pct }, Locale::Fr) => {
            format!(
                "Retard constaté sur les travaux: {completion_pct}% réalisé ({expected_pct}% attendu)"
            )
        }
        (_, AlertReason::WorkBehindSchedule { completion_pct, expected_pct }, Locale::En) => {
            format!("Works behind schedule: {completion_pct}% done ({expected_pct}% expected)")
        }
        (AlertKind::RepaymentImminent, AlertReason::RepaymentDue { days_until_payment }, Locale::Fr) => {
            format!("URGENT: Le remboursement commence dans {days_until_payment} jours!")
        }
        (AlertKind::RepaymentImminent, AlertReason::RepaymentDue { days_until_payment }, Locale::En) => {
            format!("URGENT: repayment starts in {days_until_payment} days!")
        }
        (_, AlertReason::RepaymentDue { days_until_payment }, Locale::Fr) => {
            format!("Le remboursement commence dans {days_until_payment} jours")
        }
        (_, AlertReason::RepaymentDue { days_until_payment }, Locale::En) => {
            format!("Repayment starts in {days_until_payment} days")
        }
        // Kinds without a sweep reason fall back to their identifier.
        (kind, _, _) => kind.to_string(),
    }
}

/// Subject line for the borrower-facing email.
pub fn render_subject(alert: &Alert, locale: Locale) -> String {
    match locale {
        Locale::Fr => format!("Alerte dossier de prêt - {}", alert.kind),
        Locale::En => format!("Loan dossier alert - {}", alert.kind),
    }
}

/// Borrower-facing email body.
pub fn render_email_body(alert: &Alert, loan: &Loan, client: &Client, locale: Locale) -> String {
    match locale {
        Locale::Fr => format!(
            "Bonjour {},\n\n\
             Une alerte a été générée concernant votre dossier de prêt :\n\n\
             - Type : {}\n\
             - Niveau : {}\n\
             - Message : {}\n\n\
             Dossier {} ({}), montant {:.0} FCFA.\n\n\
             Actions recommandées :\n{}\n\n\
             Pour plus d'informations, veuillez contacter votre conseiller.",
            client.full_name(),
            alert.kind,
            alert.severity,
            alert.message,
            loan.loan_number,
            loan.loan_type,
            loan.amount,
            recommended_actions(alert.kind, locale),
        ),
        Locale::En => format!(
            "Hello {},\n\n\
             An alert was raised on your loan dossier:\n\n\
             - Type: {}\n\
             - Level: {}\n\
             - Message: {}\n\n\
             Dossier {} ({}), amount {:.0} FCFA.\n\n\
             Recommended actions:\n{}\n\n\
             For more information, please contact your advisor.",
            client.full_name(),
            alert.kind,
            alert.severity,
            alert.message,
            loan.loan_number,
            loan.loan_type,
            loan.amount,
            recommended_actions(alert.kind, locale),
        ),
    }
}

/// Short SMS body.
pub fn render_sms_body(alert: &Alert, loan: &Loan, locale: Locale) -> String {
    match locale {
        Locale::Fr => format!(
            "[{}] {} - Dossier {}. Contactez votre conseiller.",
            alert.severity, alert.message, loan.loan_number
        ),
        Locale::En => format!(
            "[{}] {} - Dossier {}. Contact your advisor.",
            alert.severity, alert.message, loan.loan_number
        ),
    }
}

/// Per-kind operator guidance appended to the email.
pub fn recommended_actions(kind: AlertKind, locale: Locale) -> &'static str {
    match (kind, locale) {
        (AlertKind::ValidityWarning, Locale::Fr) => {
            "- Contactez votre conseiller pour renouveler l'offre\n- Préparez les documents manquants"
        }
        (AlertKind::ValidityWarning, Locale::En) => {
            "- Contact your advisor to renew the offer\n- Prepare any missing documents"
        }
        (AlertKind::ValidityCritical, Locale::Fr) => {
            "- URGENT: Contactez immédiatement votre conseiller\n- L'offre expire très bientôt"
        }
        (AlertKind::ValidityCritical, Locale::En) => {
            "- URGENT: contact your advisor immediately\n- The offer expires very soon"
        }
        (AlertKind::WorkDelayWarning | AlertKind::WorkDelayCritical, Locale::Fr) => {
            "- Vérifiez l'avancement des travaux\n- Contactez votre entrepreneur"
        }
        (AlertKind::WorkDelayWarning | AlertKind::WorkDelayCritical, Locale::En) => {
            "- Check the progress of the works\n- Contact your contractor"
        }
        (AlertKind::RepaymentUpcoming, Locale::Fr) => {
            "- Préparez votre premier remboursement\n- Vérifiez votre compte bancaire"
        }
        (AlertKind::RepaymentUpcoming, Locale::En) => {
            "- Prepare your first repayment\n- Check your bank account"
        }
        (AlertKind::RepaymentImminent, Locale::Fr) => {
            "- URGENT: Premier remboursement dans quelques jours\n- Assurez-vous d'avoir les fonds nécessaires"
        }
        (AlertKind::RepaymentImminent, Locale::En) => {
            "- URGENT: first repayment due in a few days\n- Make sure the funds are available"
        }
        (_, Locale::Fr) => "- Contactez votre conseiller pour plus d'informations",
        (_, Locale::En) => "- Contact your advisor for more information",
    }
}
