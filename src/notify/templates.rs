use chrono::NaiveDate;

use crate::config::StoreConfig;
use crate::models::Store;
use crate::reconcile::ItemEta;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    German,
}

impl Language {
    /// German for EU-store orders shipping to Germany, English otherwise.
    pub fn for_order(store: Store, country: &str) -> Self {
        if store == Store::Eu && country.eq_ignore_ascii_case("DE") {
            Language::German
        } else {
            Language::English
        }
    }
}

/// What a customer email is about.
pub struct DraftContext<'a> {
    pub order_number: &'a str,
    pub first_name: &'a str,
    pub language: Language,
    pub items: &'a [ItemEta],
    pub profile: &'a StoreConfig,
}

const CELL: &str = "border: 1px solid black;padding-left:5px;padding-right:5px;";

pub fn first_draft(ctx: &DraftContext<'_>) -> Draft {
    let order = escape_html(ctx.order_number);
    let name = escape_html(ctx.first_name);

    let (subject, intro) = match ctx.language {
        Language::German => (
            format!("Bestellung {} sicher erhalten, wir bearbeiten sie :)", ctx.order_number),
            format!(
                "<p> Sehr geehrter {name}, <br><br> Vielen Dank für Ihren Einkauf bei {company} und wir hoffen, dass es Ihnen gut geht. <br><br>
Wir möchten Ihnen mitteilen, dass Ihre Bestellung(en) sicher bei uns eingegangen sind und wir diese so schnell wie möglich bearbeiten werden.
Unten finden Sie den aktuellen Lagerstatus für alle Ihre Bestellungen, die ich vorliegen habe.
Ich werde Sie weiterhin mit Updates versorgen, bis Sie alles sicher erhalten haben.
Wir werden die Bestellung erst versenden, wenn alle Artikel in der Bestellung fertig sind.<br></p>",
                company = escape_html(&ctx.profile.company)
            ),
        ),
        Language::English => (
            format!("Order {} Safely Received, We Are Processing It :)", ctx.order_number),
            english_intro(&name, &ctx.profile.company),
        ),
    };

    Draft {
        subject,
        html: assemble(ctx, &order, &intro),
    }
}

pub fn follow_up_draft(ctx: &DraftContext<'_>, today: NaiveDate) -> Draft {
    let order = escape_html(ctx.order_number);
    let name = escape_html(ctx.first_name);
    let subject = format!("Order {} Update {}", ctx.order_number, today.format("%d-%m-%Y"));

    let intro = match ctx.language {
        Language::German => format!(
            "<p> Sehr geehrter {name}, <br><br> Im Anschluss an meine vorherige E-Mail habe ich Ihre Bestellung weiterverfolgt.
Bitte finden Sie unten den aktualisierten Lagerstatus für alle Ihre Bestellungen, die ich vorliegen habe.
Seien Sie versichert, dass ich weiterhin daran arbeiten werde, Ihnen mehr Updates zu geben, bis Sie alles sicher erhalten haben.
Wir werden die Bestellung erst versenden, wenn alle Artikel in der Bestellung fertig sind. <br><br>
Ich entschuldige mich für eventuelle Verzögerungen und habe dem Versand mitgeteilt,
dass diese Bestellung sofort am nächsten Tag geliefert werden sollte, sobald wir sie erhalten. <br></p>"
        ),
        Language::English => english_intro(&name, &ctx.profile.company),
    };

    Draft {
        subject,
        html: assemble(ctx, &order, &intro),
    }
}

fn english_intro(name: &str, company: &str) -> String {
    format!(
        "<p> Dear {name}, <br><br> Many thanks for shopping with {company} and we hope you are keeping well. <br><br>
Just wish to update you that your order(s) has been safely received and we will be processing them as soon as possible.
Please find below the current stock status for all your orders that I have in hand.
I will be working on providing you with more updates along the way until you have safely received everything.
We will only dispatch the order once all the items in the order are ready.<br></p>",
        company = escape_html(company)
    )
}

fn assemble(ctx: &DraftContext<'_>, order: &str, intro: &str) -> String {
    let (headings, closing) = match ctx.language {
        Language::German => (
            ["Bestellung", "Artikel", "Menge", "Voraussichtliches Versanddatum"],
            "Bitte zögern Sie nicht, sich bei Fragen an mich zu wenden. Ich helfe Ihnen gerne weiter! :) <br>\n<br> Mit freundlichen Grüßen, ",
        ),
        Language::English => (
            ["Order", "Item", "Quantity", "Estimated Dispatch Date"],
            "Please do not hesitate to give me a shout if you have any queries and I will be happy to assist! :) <br>\n<br> Kind Regards, ",
        ),
    };

    let mut html = String::from(intro);
    html.push_str("<table style='width: 60%;border-collapse: collapse;'><tr>");
    for heading in headings {
        html.push_str(&format!("<td style='{CELL}'> {heading} </td>"));
    }
    html.push_str("</tr>");

    for item in ctx.items {
        html.push_str(&format!(
            "<tr><td style='{CELL}'>{order}</td><td style='{CELL}'>{}</td><td style='{CELL}'>{}</td><td style='{CELL}'>{}</td></tr>",
            escape_html(&item.title),
            item.quantity,
            escape_html(&item.eta),
        ));
    }

    html.push_str("</table> <br> ");
    html.push_str(closing);
    html.push_str(&signature(ctx.profile));
    html
}

fn signature(profile: &StoreConfig) -> String {
    format!(
        "<br> {} | {}<br>T: {}<br> E: {}<br> W: {}<br>",
        escape_html(&profile.signature_name),
        escape_html(&profile.company),
        escape_html(&profile.phone),
        escape_html(&profile.sender_email),
        escape_html(&profile.website),
    )
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
