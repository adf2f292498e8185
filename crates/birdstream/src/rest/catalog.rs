//! The convenience endpoints as data.
//!
//! Each entry names an HTTP method, a path template relative to `rest_base`
//! and the parameters the endpoint always sends. [`RestClient::call`] is the
//! only interpreter of this table.
//!
//! [`RestClient::call`]: super::RestClient::call

use reqwest::Method;

use super::{Params, RestError};

/// One REST endpoint.
#[derive(Debug)]
pub struct Endpoint {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub method: Method,
    /// Path below `rest_base`. `{name}` segments are filled from the call's
    /// arguments and percent-encoded.
    pub path: &'static str,
    /// Arguments that must be supplied and are sent as request parameters.
    pub required: &'static [&'static str],
    /// Parameters sent unless the caller overrides them.
    pub defaults: &'static [(&'static str, &'static str)],
}

macro_rules! endpoint {
    ($method:ident $path:literal => $name:literal $(| $alias:literal)* $(, required: [$($req:literal),*])? $(, defaults: {$($k:literal: $v:literal),*})?) => {
        Endpoint {
            name: $name,
            aliases: &[$($alias),*],
            method: Method::$method,
            path: $path,
            required: &[$($($req),*)?],
            defaults: &[$($(($k, $v)),*)?],
        }
    };
}

pub static ENDPOINTS: &[Endpoint] = &[
    // Timelines
    endpoint!(GET "/statuses/public_timeline.json" => "get_public_timeline"),
    endpoint!(GET "/statuses/home_timeline.json" => "get_home_timeline"),
    endpoint!(GET "/statuses/friends_timeline.json" => "get_friends_timeline"),
    endpoint!(GET "/statuses/user_timeline.json" => "get_user_timeline"),
    endpoint!(GET "/statuses/mentions.json" => "get_mentions"),
    endpoint!(GET "/statuses/retweeted_by_me.json" => "get_retweeted_by_me"),
    endpoint!(GET "/statuses/retweeted_to_me.json" => "get_retweeted_to_me"),
    endpoint!(GET "/statuses/retweets_of_me.json" => "get_retweets_of_me"),
    // Statuses
    endpoint!(GET "/statuses/show/{id}.json" => "show_status"),
    endpoint!(POST "/statuses/update.json" => "update_status",
        required: ["status"], defaults: {"include_entities": "1"}),
    endpoint!(POST "/statuses/destroy/{id}.json" => "destroy_status" | "delete_status"),
    endpoint!(POST "/statuses/retweet/{id}.json" => "retweet_status"),
    endpoint!(POST "/statuses/retweets/{id}.json" => "get_retweets"),
    endpoint!(POST "/statuses/{id}/retweeted_by.json" => "get_retweeted_by"),
    endpoint!(POST "/statuses/{id}/retweeted_by/ids.json" => "get_retweeted_by_ids"),
    // Users
    endpoint!(GET "/users/show.json" => "show_user" | "lookup_user" | "lookup_users"),
    endpoint!(GET "/users/search.json" => "search_user" | "search_users", required: ["q"]),
    // Trends
    endpoint!(GET "/trends.json" => "get_trends"),
    endpoint!(GET "/trends/current.json" => "get_current_trends"),
    endpoint!(GET "/trends/daily.json" => "get_daily_trends"),
    endpoint!(GET "/trends/weekly.json" => "get_weekly_trends"),
    // Lists
    endpoint!(GET "/{screen_name}/lists.json" => "get_lists"),
    endpoint!(POST "/{screen_name}/lists.json" => "create_list", required: ["name"]),
    endpoint!(POST "/{screen_name}/lists/{list_id}.json" => "update_list"),
    endpoint!(GET "/{screen_name}/lists/{list_id}.json" => "show_list"),
    endpoint!(POST "/{screen_name}/lists/{list_id}.json" => "delete_list" | "destroy_list",
        defaults: {"_method": "DELETE"}),
    endpoint!(GET "/{screen_name}/lists/{list_id}/statuses.json" => "get_list_timeline" | "show_list_statuses"),
    endpoint!(GET "/{screen_name}/lists/memberships.json" => "get_list_memberships"),
    endpoint!(GET "/{screen_name}/lists/subscriptions.json" => "get_list_subscriptions"),
    // Direct messages
    endpoint!(GET "/direct_messages.json" => "get_direct_messages"),
    endpoint!(GET "/direct_messages/sent.json" => "get_direct_messages_sent" | "get_sent_direct_messages"),
    endpoint!(POST "/direct_messages/new.json" => "new_direct_message" | "send_direct_message" | "update_direct_message",
        required: ["text"], defaults: {"include_entities": "1"}),
    endpoint!(POST "/direct_messages/destroy/{id}.json" => "destroy_direct_message" | "delete_direct_message",
        defaults: {"_method": "DELETE"}),
    // Account
    endpoint!(GET "/account/verify_credentials.json" => "verify_credentials"),
    // Favorites
    endpoint!(GET "/favorites.json" => "get_favorites"),
    endpoint!(POST "/favorites/create/{id}.json" => "create_favorite" | "favorite_status"),
    endpoint!(POST "/favorites/destroy/{id}.json" => "destroy_favorite" | "delete_favorite"),
];

/// Finds an endpoint by name or alias.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static Endpoint> {
    ENDPOINTS
        .iter()
        .find(|e| e.name == name || e.aliases.iter().any(|alias| *alias == name))
}

impl Endpoint {
    /// Fills the path template from `args`, removing every argument it uses.
    ///
    /// # Errors
    ///
    /// [`RestError::MissingArgument`] if a placeholder has no argument.
    pub fn render_path(&self, args: &mut Params) -> Result<String, RestError> {
        let mut out = String::with_capacity(self.path.len());
        let mut rest = self.path;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').unwrap_or(after.len());
            let key = &after[..close];
            let value = args.remove(key).ok_or_else(|| self.missing(key))?;
            out.push_str(&urlencoding::encode(&value));
            rest = after.get(close + 1..).unwrap_or("");
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Builds the request parameters: defaults, then required arguments,
    /// then whatever remains in `args`, then `params`. Later sources win.
    ///
    /// # Errors
    ///
    /// [`RestError::MissingArgument`] if a required argument is absent.
    pub fn request_params(&self, mut args: Params, params: Params) -> Result<Params, RestError> {
        let mut out: Params = self
            .defaults
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        for key in self.required {
            let value = args.remove(*key).ok_or_else(|| self.missing(key))?;
            out.insert((*key).to_owned(), value);
        }
        out.extend(args);
        out.extend(params);
        Ok(out)
    }

    fn missing(&self, name: &str) -> RestError {
        RestError::MissingArgument {
            endpoint: self.name,
            name: name.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::params;

    #[test]
    fn names_and_aliases_are_unique() {
        let mut seen = HashSet::new();
        for endpoint in ENDPOINTS {
            assert!(seen.insert(endpoint.name), "duplicate {}", endpoint.name);
            for alias in endpoint.aliases {
                assert!(seen.insert(*alias), "duplicate {alias}");
            }
        }
    }

    #[test]
    fn aliases_resolve_to_same_entry() {
        let a = lookup("destroy_status").unwrap();
        let b = lookup("delete_status").unwrap();
        assert!(core::ptr::eq(a, b));
        assert!(lookup("statuses/nonexistent").is_none());
    }

    #[test]
    fn render_fills_and_encodes_placeholders() {
        let endpoint = lookup("get_list_timeline").unwrap();
        let mut args = params! { "screen_name" => "rust lang", "list_id" => 42, "per_page" => 5 };
        let path = endpoint.render_path(&mut args).unwrap();
        assert_eq!(path, "/rust%20lang/lists/42/statuses.json");
        assert_eq!(args, params! { "per_page" => 5 });
    }

    #[test]
    fn render_reports_missing_placeholder() {
        let endpoint = lookup("show_status").unwrap();
        let err = endpoint.render_path(&mut params! {}).unwrap_err();
        assert_eq!(err.to_string(), "endpoint `show_status` needs argument `id`");
    }

    #[test]
    fn caller_params_override_defaults() {
        let endpoint = lookup("update_status").unwrap();
        let params = endpoint
            .request_params(
                params! { "status" => "hello" },
                params! { "include_entities" => "0", "lat" => "1.5" },
            )
            .unwrap();
        assert_eq!(
            params,
            params! { "include_entities" => "0", "lat" => "1.5", "status" => "hello" }
        );

        let err = endpoint.request_params(params! {}, params! {}).unwrap_err();
        assert!(matches!(err, RestError::MissingArgument { name, .. } if name == "status"));
    }

    #[test]
    fn delete_goes_through_post_override() {
        let endpoint = lookup("destroy_list").unwrap();
        assert_eq!(endpoint.method, Method::POST);
        let params = endpoint.request_params(params! {}, params! {}).unwrap();
        assert_eq!(params.get("_method").map(String::as_str), Some("DELETE"));
    }
}
