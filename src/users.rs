use crate::linked::LinkedIndex;
use crate::model::User;

/// Registered accounts keyed by case-sensitive username, newest first.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: LinkedIndex<User>,
}

impl UserDirectory {
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        let mut directory = Self::default();
        for user in users {
            let username = user.username.clone();
            if !directory.users.push_back(username.clone(), user) {
                log::warn!("dropping duplicate account {username}");
            }
        }
        directory
    }

    pub fn register(&mut self, username: &str, password: &str, is_admin: bool) -> bool {
        self.users.push_front(
            username.to_string(),
            User::new(username, password, is_admin),
        )
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        self.find(username).filter(|user| user.password == password)
    }

    pub fn verify_password(&self, username: &str, password: &str) -> bool {
        self.authenticate(username, password).is_some()
    }

    pub fn find(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    pub fn find_mut(&mut self, username: &str) -> Option<&mut User> {
        self.users.get_mut(username)
    }

    pub fn update_username(&mut self, old: &str, new: &str) -> bool {
        if old == new || !self.users.rekey(old, new) {
            return false;
        }
        if let Some(user) = self.users.get_mut(new) {
            user.username = new.to_string();
        }
        true
    }

    pub fn update_password(&mut self, username: &str, password: &str) -> bool {
        let Some(user) = self.find_mut(username) else {
            return false;
        };
        user.password = password.to_string();
        true
    }

    pub fn set_profile_image(&mut self, username: &str, image_path: &str) -> bool {
        let Some(user) = self.find_mut(username) else {
            return false;
        };
        user.profile_image = image_path.to_string();
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
